//! Scheduler Output
//!
//! Per-slot DCI and PDU records consumed by the PHY-facing pipeline.

use common::types::{AggregationLevel, DuUeIndex, HarqId, OfdmSymbolRange, PrbInterval, Rnti, SearchSpaceId};
use common::SlotPoint;

/// RNTI type and DCI format used to schedule a PDSCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DciDlRntiConfigType {
    #[default]
    CRntiF1_0,
    TcRntiF1_0,
    CRntiF1_1,
}

impl DciDlRntiConfigType {
    /// Fallback formats use fixed field sizes
    pub fn is_fallback(&self) -> bool {
        !matches!(self, DciDlRntiConfigType::CRntiF1_1)
    }
}

/// RNTI type and DCI format used to schedule a PUSCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DciUlRntiConfigType {
    #[default]
    CRntiF0_0,
    TcRntiF0_0,
    CRntiF0_1,
}

impl DciUlRntiConfigType {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, DciUlRntiConfigType::CRntiF0_1)
    }
}

/// DCI format 1_0 scrambled by C-RNTI or TC-RNTI (TS 38.212 7.3.1.2.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DciF1_0 {
    /// Size of the BWP used to derive the FDRA field
    pub n_rb_dl_bwp: u16,
    pub frequency_resource: u32,
    pub time_resource: u8,
    pub vrb_to_prb_mapping: u8,
    pub modulation_coding_scheme: u8,
    pub new_data_indicator: bool,
    pub redundancy_version: u8,
    pub harq_process_number: u8,
    /// Not present for TC-RNTI
    pub dl_assignment_index: u8,
    pub tpc_command: u8,
    pub pucch_resource_indicator: u8,
    pub pdsch_harq_fb_timing_indicator: u8,
}

/// Per transport block fields of DCI format 1_1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciF1_1Tb {
    pub modulation_coding_scheme: u8,
    pub new_data_indicator: bool,
    pub redundancy_version: u8,
}

/// DCI format 1_1 scrambled by C-RNTI (TS 38.212 7.3.1.2.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DciF1_1 {
    pub n_rb_dl_bwp: u16,
    pub frequency_resource: u32,
    pub time_resource: u8,
    pub tb1: DciF1_1Tb,
    pub tb2: Option<DciF1_1Tb>,
    pub harq_process_number: u8,
    pub dl_assignment_index: u8,
    pub tpc_command: u8,
    pub pucch_resource_indicator: u8,
    pub pdsch_harq_fb_timing_indicator: u8,
}

/// DL DCI payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DciDlInfo {
    CRntiF1_0(DciF1_0),
    TcRntiF1_0(DciF1_0),
    CRntiF1_1(DciF1_1),
}

impl DciDlInfo {
    pub fn config_type(&self) -> DciDlRntiConfigType {
        match self {
            DciDlInfo::CRntiF1_0(_) => DciDlRntiConfigType::CRntiF1_0,
            DciDlInfo::TcRntiF1_0(_) => DciDlRntiConfigType::TcRntiF1_0,
            DciDlInfo::CRntiF1_1(_) => DciDlRntiConfigType::CRntiF1_1,
        }
    }

    pub fn harq_process_number(&self) -> u8 {
        match self {
            DciDlInfo::CRntiF1_0(d) | DciDlInfo::TcRntiF1_0(d) => d.harq_process_number,
            DciDlInfo::CRntiF1_1(d) => d.harq_process_number,
        }
    }

    pub fn pucch_resource_indicator(&self) -> u8 {
        match self {
            DciDlInfo::CRntiF1_0(d) | DciDlInfo::TcRntiF1_0(d) => d.pucch_resource_indicator,
            DciDlInfo::CRntiF1_1(d) => d.pucch_resource_indicator,
        }
    }
}

/// DCI format 0_0 scrambled by C-RNTI or TC-RNTI (TS 38.212 7.3.1.1.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DciF0_0 {
    pub n_ul_hop: u8,
    pub n_rb_ul_bwp: u16,
    pub frequency_resource: u32,
    pub time_resource: u8,
    pub frequency_hopping_flag: bool,
    pub modulation_coding_scheme: u8,
    pub new_data_indicator: bool,
    pub redundancy_version: u8,
    pub harq_process_number: u8,
    pub tpc_command: u8,
}

/// DCI format 0_1 scrambled by C-RNTI (TS 38.212 7.3.1.1.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DciF0_1 {
    pub n_rb_ul_bwp: u16,
    pub frequency_resource: u32,
    pub time_resource: u8,
    pub frequency_hopping_flag: bool,
    pub modulation_coding_scheme: u8,
    pub new_data_indicator: bool,
    pub redundancy_version: u8,
    pub harq_process_number: u8,
    pub first_dl_assignment_index: u8,
    pub tpc_command: u8,
}

/// UL DCI payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DciUlInfo {
    CRntiF0_0(DciF0_0),
    TcRntiF0_0(DciF0_0),
    CRntiF0_1(DciF0_1),
}

impl DciUlInfo {
    pub fn config_type(&self) -> DciUlRntiConfigType {
        match self {
            DciUlInfo::CRntiF0_0(_) => DciUlRntiConfigType::CRntiF0_0,
            DciUlInfo::TcRntiF0_0(_) => DciUlRntiConfigType::TcRntiF0_0,
            DciUlInfo::CRntiF0_1(_) => DciUlRntiConfigType::CRntiF0_1,
        }
    }

    pub fn harq_process_number(&self) -> u8 {
        match self {
            DciUlInfo::CRntiF0_0(d) | DciUlInfo::TcRntiF0_0(d) => d.harq_process_number,
            DciUlInfo::CRntiF0_1(d) => d.harq_process_number,
        }
    }
}

/// PDCCH candidate reserved for a UE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdcchContext {
    pub rnti: Rnti,
    pub ss_id: SearchSpaceId,
    pub aggr_lvl: AggregationLevel,
    /// First CCE of the candidate
    pub ncce: u32,
}

/// PDCCH carrying a DL assignment. The DCI is filled once the grant is committed.
#[derive(Debug, Clone)]
pub struct PdcchDlInformation {
    pub ctx: PdcchContext,
    pub dci: Option<DciDlInfo>,
}

/// PDCCH carrying a UL grant. The DCI is filled once the grant is committed.
#[derive(Debug, Clone)]
pub struct PdcchUlInformation {
    pub ctx: PdcchContext,
    pub dci: Option<DciUlInfo>,
}

/// Codeword of a PDSCH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdschCodeword {
    pub mcs: u8,
    pub tbs_bytes: u32,
    pub rv: u8,
    pub new_data: bool,
}

/// PDSCH PDU
#[derive(Debug, Clone)]
pub struct PdschInformation {
    pub rnti: Rnti,
    pub prbs: PrbInterval,
    pub symbols: OfdmSymbolRange,
    pub codewords: Vec<PdschCodeword>,
    pub harq_id: HarqId,
    pub nof_layers: u8,
}

/// Scheduling context kept alongside the PDSCH PDU
#[derive(Debug, Clone, Copy)]
pub struct DlMsgAllocContext {
    pub ue_index: DuUeIndex,
    pub ss_id: SearchSpaceId,
    pub k1: u8,
    pub nof_retxs: u32,
}

/// UE PDSCH grant in the slot result
#[derive(Debug, Clone)]
pub struct DlMsgAlloc {
    pub pdsch_cfg: PdschInformation,
    pub context: DlMsgAllocContext,
}

/// PUSCH PDU
#[derive(Debug, Clone)]
pub struct PuschInformation {
    pub rnti: Rnti,
    pub prbs: PrbInterval,
    pub symbols: OfdmSymbolRange,
    pub mcs: u8,
    pub tbs_bytes: u32,
    pub rv: u8,
    pub new_data: bool,
    pub harq_id: HarqId,
}

/// UCI multiplexed on a PUSCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UciOnPusch {
    pub harq_ack_nof_bits: u8,
}

/// Scheduling context kept alongside the PUSCH PDU
#[derive(Debug, Clone, Copy)]
pub struct UlSchedContext {
    pub ue_index: DuUeIndex,
    pub ss_id: SearchSpaceId,
    pub nof_retxs: u32,
}

/// UE PUSCH grant in the slot result
#[derive(Debug, Clone)]
pub struct UlSchedInfo {
    pub pusch_cfg: PuschInformation,
    pub uci: Option<UciOnPusch>,
    pub context: UlSchedContext,
}

/// PUCCH format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PucchFormat {
    F1,
    F2,
}

/// PUCCH PDU carrying HARQ-ACK bits
#[derive(Debug, Clone)]
pub struct PucchInfo {
    pub rnti: Rnti,
    pub format: PucchFormat,
    pub resource_indicator: u8,
    pub harq_ack_nof_bits: u8,
}

/// DL part of a slot result
#[derive(Debug, Clone, Default)]
pub struct DlSchedResult {
    pub dl_pdcchs: Vec<PdcchDlInformation>,
    pub ul_pdcchs: Vec<PdcchUlInformation>,
    pub ue_grants: Vec<DlMsgAlloc>,
}

/// UL part of a slot result
#[derive(Debug, Clone, Default)]
pub struct UlSchedResult {
    pub puschs: Vec<UlSchedInfo>,
    pub pucchs: Vec<PucchInfo>,
}

/// Everything scheduled for one slot
#[derive(Debug, Clone)]
pub struct SchedResult {
    pub slot: SlotPoint,
    pub dl: DlSchedResult,
    pub ul: UlSchedResult,
}

impl SchedResult {
    pub fn new(slot: SlotPoint) -> Self {
        Self { slot, dl: DlSchedResult::default(), ul: UlSchedResult::default() }
    }
}
