//! Scheduler Configuration Structures
//!
//! Cell, HARQ and expert parameters consumed by the HARQ engine and the
//! grant allocator. All structures can be loaded from TOML.

use common::types::{
    CrbInterval, DuCellIndex, DuplexMode, OfdmSymbolRange, SearchSpaceId, SubcarrierSpacing,
    AggregationLevel,
};
use common::SlotPoint;
use num_traits::FromPrimitive;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::MacError;

/// HARQ configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarqConfig {
    /// Number of DL HARQ processes per UE
    #[serde(default = "default_nof_harqs")]
    pub nof_dl_harqs: u8,
    /// Number of UL HARQ processes per UE
    #[serde(default = "default_nof_harqs")]
    pub nof_ul_harqs: u8,
    /// Maximum number of retransmissions of a transport block
    #[serde(default = "default_max_nof_harq_retxs")]
    pub max_nof_harq_retxs: u8,
    /// Slots to wait for a HARQ-ACK after the expected feedback slot
    #[serde(default = "default_dl_max_ack_wait")]
    pub dl_max_ack_wait_in_slots: u32,
    /// Slots to wait for a CRC after the PUSCH slot
    #[serde(default = "default_ul_max_ack_wait")]
    pub ul_max_ack_wait_in_slots: u32,
    /// Slots a HARQ may stay pending retransmission before it is dropped.
    /// Defaults to a quarter of the system frame period.
    #[serde(default)]
    pub max_pending_retx_slots: Option<u32>,
}

fn default_nof_harqs() -> u8 {
    16
}

fn default_max_nof_harq_retxs() -> u8 {
    4
}

fn default_dl_max_ack_wait() -> u32 {
    20
}

fn default_ul_max_ack_wait() -> u32 {
    10
}

impl Default for HarqConfig {
    fn default() -> Self {
        Self {
            nof_dl_harqs: default_nof_harqs(),
            nof_ul_harqs: default_nof_harqs(),
            max_nof_harq_retxs: default_max_nof_harq_retxs(),
            dl_max_ack_wait_in_slots: default_dl_max_ack_wait(),
            ul_max_ack_wait_in_slots: default_ul_max_ack_wait(),
            max_pending_retx_slots: None,
        }
    }
}

impl HarqConfig {
    /// Pending-retransmission safety net for the given numerology
    pub fn pending_retx_timeout(&self, numerology: u8) -> u32 {
        self.max_pending_retx_slots.unwrap_or_else(|| {
            SlotPoint::from_count(numerology, 0).nof_slots_per_system_frame() / 4
        })
    }

    pub fn validate(&self) -> Result<(), MacError> {
        for (name, nof) in [("DL", self.nof_dl_harqs), ("UL", self.nof_ul_harqs)] {
            if nof == 0 || nof as usize > common::HarqId::MAX_NOF_HARQS {
                return Err(MacError::InvalidConfiguration(format!(
                    "Invalid number of {} HARQ processes: {}",
                    name, nof
                )));
            }
        }
        if self.dl_max_ack_wait_in_slots == 0 || self.ul_max_ack_wait_in_slots == 0 {
            return Err(MacError::InvalidConfiguration(
                "HARQ ACK wait must be at least one slot".into(),
            ));
        }
        if let Some(max_pending) = self.max_pending_retx_slots {
            // Slot distances fold at half the system frame period of the slowest numerology
            let max_distance = SlotPoint::from_count(0, 0).nof_slots_per_system_frame() / 2;
            if max_pending == 0 || max_pending >= max_distance {
                return Err(MacError::InvalidConfiguration(format!(
                    "Pending retransmission timeout of {} slots outside 1..{}",
                    max_pending, max_distance
                )));
            }
        }
        Ok(())
    }
}

/// Scheduler expert configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerExpertConfig {
    /// HARQ parameters
    #[serde(default)]
    pub harq: HarqConfig,
    /// Maximum PDSCH grants per slot
    #[serde(default = "default_max_grants_per_slot")]
    pub max_pdschs_per_slot: usize,
    /// Maximum PUSCH grants per slot
    #[serde(default = "default_max_grants_per_slot")]
    pub max_puschs_per_slot: usize,
    /// Maximum DL or UL PDCCHs per slot
    #[serde(default = "default_max_grants_per_slot")]
    pub max_pdcchs_per_slot: usize,
    /// Maximum PUCCH grants per slot
    #[serde(default = "default_max_pucchs_per_slot")]
    pub max_pucchs_per_slot: usize,
    /// HARQ-ACK bits that fit in a PUCCH format 1 resource
    #[serde(default = "default_max_harq_bits_f1")]
    pub max_harq_bits_per_pucch_f1: u8,
    /// HARQ-ACK bits that fit in a PUCCH format 2 resource
    #[serde(default = "default_max_harq_bits_f2")]
    pub max_harq_bits_per_pucch_f2: u8,
    /// Maximum effective code rate for new transmissions
    #[serde(default = "default_max_code_rate")]
    pub max_code_rate: f64,
}

fn default_max_grants_per_slot() -> usize {
    16
}

fn default_max_pucchs_per_slot() -> usize {
    32
}

fn default_max_harq_bits_f1() -> u8 {
    2
}

fn default_max_harq_bits_f2() -> u8 {
    11
}

fn default_max_code_rate() -> f64 {
    0.95
}

impl Default for SchedulerExpertConfig {
    fn default() -> Self {
        Self {
            harq: HarqConfig::default(),
            max_pdschs_per_slot: default_max_grants_per_slot(),
            max_puschs_per_slot: default_max_grants_per_slot(),
            max_pdcchs_per_slot: default_max_grants_per_slot(),
            max_pucchs_per_slot: default_max_pucchs_per_slot(),
            max_harq_bits_per_pucch_f1: default_max_harq_bits_f1(),
            max_harq_bits_per_pucch_f2: default_max_harq_bits_f2(),
            max_code_rate: default_max_code_rate(),
        }
    }
}

impl SchedulerExpertConfig {
    /// Load expert configuration from a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, MacError> {
        let config: SchedulerExpertConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MacError> {
        self.harq.validate()?;
        if !(0.0..=1.0).contains(&self.max_code_rate) || self.max_code_rate == 0.0 {
            return Err(MacError::InvalidConfiguration(format!(
                "Invalid maximum code rate: {}",
                self.max_code_rate
            )));
        }
        if self.max_harq_bits_per_pucch_f1 == 0
            || self.max_harq_bits_per_pucch_f2 < self.max_harq_bits_per_pucch_f1
        {
            return Err(MacError::InvalidConfiguration(
                "PUCCH format 2 must carry at least as many HARQ bits as format 1".into(),
            ));
        }
        Ok(())
    }
}

/// Rows of a time domain allocation list addressable by the 4-bit DCI field
pub const MAX_NOF_TD_RESOURCES: usize = 16;

/// TDD pattern: DL slots at the start of the period, UL slots at the end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TddPattern {
    /// Period in slots
    pub period_slots: u32,
    /// Number of full DL slots
    pub nof_dl_slots: u32,
    /// Number of full UL slots
    pub nof_ul_slots: u32,
}

/// PDSCH time domain resource (TS 38.214 5.1.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PdschTimeDomainResource {
    pub k0: u8,
    pub symbols: OfdmSymbolRange,
}

/// PUSCH time domain resource (TS 38.214 6.1.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PuschTimeDomainResource {
    pub k2: u8,
    pub symbols: OfdmSymbolRange,
}

/// SearchSpace type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SearchSpaceType {
    Common,
    UeSpecific,
}

/// DL DCI format monitored in a SearchSpace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DlDciFormat {
    F1_0,
    F1_1,
}

/// UL DCI format monitored in a SearchSpace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UlDciFormat {
    F0_0,
    F0_1,
}

/// SearchSpace configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchSpaceConfig {
    pub id: SearchSpaceId,
    pub ss_type: SearchSpaceType,
    pub dl_dci_format: DlDciFormat,
    pub ul_dci_format: UlDciFormat,
    /// PDCCH candidates per aggregation level {1, 2, 4, 8, 16}
    pub nof_candidates: [u8; AggregationLevel::COUNT],
}

impl SearchSpaceConfig {
    pub fn nof_candidates(&self, aggr_lvl: AggregationLevel) -> u8 {
        self.nof_candidates[aggr_lvl.index()]
    }
}

/// Cell configuration used by the scheduler
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellConfig {
    /// DU cell index
    pub cell_index: DuCellIndex,
    /// Subcarrier spacing in kHz
    #[serde(rename = "scs_khz", deserialize_with = "deserialize_scs", serialize_with = "serialize_scs")]
    pub scs: SubcarrierSpacing,
    /// Duplex mode
    pub duplex_mode: DuplexMode,
    /// TDD pattern, required in TDD
    #[serde(default)]
    pub tdd_pattern: Option<TddPattern>,
    /// CRBs of the active BWP
    pub bwp_crbs: CrbInterval,
    /// Size of the UE CORESET in CCEs
    #[serde(default = "default_coreset_nof_cces")]
    pub coreset_nof_cces: u32,
    /// PDSCH time domain resource allocation list
    #[serde(default = "default_pdsch_td_list")]
    pub pdsch_td_alloc_list: Vec<PdschTimeDomainResource>,
    /// PUSCH time domain resource allocation list
    #[serde(default = "default_pusch_td_list")]
    pub pusch_td_alloc_list: Vec<PuschTimeDomainResource>,
    /// k1 candidates (dl-DataToUL-ACK)
    #[serde(default = "default_dl_data_to_ul_ack")]
    pub dl_data_to_ul_ack: Vec<u8>,
    /// Number of PUCCH resources addressable by the PUCCH resource indicator
    #[serde(default = "default_nof_pucch_resources")]
    pub nof_pucch_resources: u8,
    /// SearchSpaces configured for UEs of this cell
    pub search_spaces: Vec<SearchSpaceConfig>,
    /// SearchSpace used for random access
    pub ra_search_space_id: SearchSpaceId,
}

fn default_coreset_nof_cces() -> u32 {
    24
}

fn default_pdsch_td_list() -> Vec<PdschTimeDomainResource> {
    vec![PdschTimeDomainResource { k0: 0, symbols: OfdmSymbolRange { start: 2, stop: 14 } }]
}

fn default_pusch_td_list() -> Vec<PuschTimeDomainResource> {
    vec![PuschTimeDomainResource { k2: 4, symbols: OfdmSymbolRange { start: 0, stop: 14 } }]
}

fn default_dl_data_to_ul_ack() -> Vec<u8> {
    vec![4, 5, 6, 7, 8]
}

fn default_nof_pucch_resources() -> u8 {
    8
}

fn deserialize_scs<'de, D>(deserializer: D) -> Result<SubcarrierSpacing, D::Error>
where
    D: Deserializer<'de>,
{
    let khz = u32::deserialize(deserializer)?;
    SubcarrierSpacing::from_u32(khz)
        .ok_or_else(|| de::Error::custom(format!("Invalid subcarrier spacing: {} kHz", khz)))
}

fn serialize_scs<S>(scs: &SubcarrierSpacing, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u32(*scs as u32)
}

impl CellConfig {
    /// FDD cell with the default time domain lists and one common plus one UE-specific SearchSpace
    pub fn new_fdd(cell_index: DuCellIndex, scs: SubcarrierSpacing, nof_crbs: u16) -> Self {
        Self {
            cell_index,
            scs,
            duplex_mode: DuplexMode::Fdd,
            tdd_pattern: None,
            bwp_crbs: CrbInterval::new(0, nof_crbs),
            coreset_nof_cces: default_coreset_nof_cces(),
            pdsch_td_alloc_list: default_pdsch_td_list(),
            pusch_td_alloc_list: default_pusch_td_list(),
            dl_data_to_ul_ack: default_dl_data_to_ul_ack(),
            nof_pucch_resources: default_nof_pucch_resources(),
            search_spaces: vec![
                SearchSpaceConfig {
                    id: SearchSpaceId(1),
                    ss_type: SearchSpaceType::Common,
                    dl_dci_format: DlDciFormat::F1_0,
                    ul_dci_format: UlDciFormat::F0_0,
                    nof_candidates: [0, 0, 2, 2, 1],
                },
                SearchSpaceConfig {
                    id: SearchSpaceId(2),
                    ss_type: SearchSpaceType::UeSpecific,
                    dl_dci_format: DlDciFormat::F1_1,
                    ul_dci_format: UlDciFormat::F0_1,
                    nof_candidates: [0, 4, 4, 2, 1],
                },
            ],
            ra_search_space_id: SearchSpaceId(1),
        }
    }

    /// TDD cell, otherwise identical to [`CellConfig::new_fdd`]
    pub fn new_tdd(
        cell_index: DuCellIndex,
        scs: SubcarrierSpacing,
        nof_crbs: u16,
        pattern: TddPattern,
    ) -> Self {
        let mut cfg = Self::new_fdd(cell_index, scs, nof_crbs);
        cfg.duplex_mode = DuplexMode::Tdd;
        cfg.tdd_pattern = Some(pattern);
        cfg.dl_data_to_ul_ack = (1..=8).collect();
        cfg
    }

    /// Load a cell configuration from a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, MacError> {
        let config: CellConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MacError> {
        if self.bwp_crbs.start >= self.bwp_crbs.stop {
            return Err(MacError::InvalidConfiguration(format!(
                "Invalid BWP CRBs {}",
                self.bwp_crbs
            )));
        }
        if self.pdsch_td_alloc_list.is_empty() || self.pusch_td_alloc_list.is_empty() {
            return Err(MacError::InvalidConfiguration(
                "Time domain resource lists cannot be empty".into(),
            ));
        }
        if self.pdsch_td_alloc_list.len() > MAX_NOF_TD_RESOURCES
            || self.pusch_td_alloc_list.len() > MAX_NOF_TD_RESOURCES
        {
            return Err(MacError::InvalidConfiguration(format!(
                "Time domain resource lists are limited to {} entries",
                MAX_NOF_TD_RESOURCES
            )));
        }
        let symbols_valid = |s: &OfdmSymbolRange| {
            s.start < s.stop && s.stop <= OfdmSymbolRange::NOF_SYMBOLS_PER_SLOT
        };
        if !self.pdsch_td_alloc_list.iter().all(|td| symbols_valid(&td.symbols))
            || !self.pusch_td_alloc_list.iter().all(|td| symbols_valid(&td.symbols))
        {
            return Err(MacError::InvalidConfiguration("Invalid OFDM symbol range".into()));
        }
        if self.dl_data_to_ul_ack.is_empty() || self.dl_data_to_ul_ack.contains(&0) {
            return Err(MacError::InvalidConfiguration(format!(
                "Invalid dl-DataToUL-ACK list {:?}",
                self.dl_data_to_ul_ack
            )));
        }
        if self.nof_pucch_resources == 0 || self.nof_pucch_resources > 8 {
            return Err(MacError::InvalidConfiguration(format!(
                "Invalid number of PUCCH resources: {}",
                self.nof_pucch_resources
            )));
        }
        if self.find_search_space(self.ra_search_space_id).is_none() {
            return Err(MacError::InvalidConfiguration(format!(
                "RA SearchSpace {} is not configured",
                self.ra_search_space_id.0
            )));
        }
        match (self.duplex_mode, &self.tdd_pattern) {
            (DuplexMode::Tdd, None) => {
                return Err(MacError::InvalidConfiguration("TDD cell without TDD pattern".into()))
            }
            (DuplexMode::Tdd, Some(p))
                if p.period_slots == 0 || p.nof_dl_slots + p.nof_ul_slots > p.period_slots =>
            {
                return Err(MacError::InvalidConfiguration(format!("Invalid TDD pattern {:?}", p)))
            }
            _ => {}
        }
        Ok(())
    }

    pub fn is_tdd(&self) -> bool {
        self.duplex_mode == DuplexMode::Tdd
    }

    fn tdd_slot_index(&self, slot: SlotPoint) -> Option<(u32, &TddPattern)> {
        match (&self.duplex_mode, &self.tdd_pattern) {
            (DuplexMode::Tdd, Some(p)) => Some((slot.count() % p.period_slots, p)),
            _ => None,
        }
    }

    /// Whether DL transmissions are possible in the given slot
    pub fn is_dl_enabled(&self, slot: SlotPoint) -> bool {
        match self.tdd_slot_index(slot) {
            Some((idx, p)) => idx < p.nof_dl_slots,
            None => true,
        }
    }

    /// Whether UL transmissions are possible in the given slot
    pub fn is_ul_enabled(&self, slot: SlotPoint) -> bool {
        match self.tdd_slot_index(slot) {
            Some((idx, p)) => idx >= p.period_slots - p.nof_ul_slots,
            None => true,
        }
    }

    pub fn find_search_space(&self, ss_id: SearchSpaceId) -> Option<&SearchSpaceConfig> {
        self.search_spaces.iter().find(|ss| ss.id == ss_id)
    }

    /// Per TDD-period slot index, the ordered k1 values whose HARQ-ACK lands in a UL slot.
    /// Empty for FDD cells.
    pub fn tdd_k1_table(&self) -> Vec<Vec<u8>> {
        let pattern = match (&self.duplex_mode, &self.tdd_pattern) {
            (DuplexMode::Tdd, Some(p)) => p,
            _ => return Vec::new(),
        };
        let first_ul = pattern.period_slots - pattern.nof_ul_slots;
        let mut sorted_k1 = self.dl_data_to_ul_ack.clone();
        sorted_k1.sort_unstable();

        (0..pattern.period_slots)
            .map(|idx| {
                if idx >= pattern.nof_dl_slots {
                    return Vec::new();
                }
                sorted_k1
                    .iter()
                    .copied()
                    .filter(|&k1| (idx + k1 as u32) % pattern.period_slots >= first_ul)
                    .collect()
            })
            .collect()
    }
}
