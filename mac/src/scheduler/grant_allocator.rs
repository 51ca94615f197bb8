//! UE Grant Allocator
//!
//! Commits UE PDSCH and PUSCH grants. A grant reserves a PDCCH candidate, a
//! HARQ-ACK UCI resource (DL only) and CRBs in the resource grid before the
//! HARQ process is touched and the DCI and PDUs are emitted. Any rejection
//! leaves the cell and the UE as they were before the call.

use std::collections::BTreeMap;

use common::types::{AggregationLevel, CrbInterval, DuCellIndex, DuUeIndex, HarqId, PrbInterval, SearchSpaceId};
use common::SlotPoint;
use tracing::debug;

use super::dci_builder::{
    build_dci_f0_0_c_rnti, build_dci_f0_0_tc_rnti, build_dci_f0_1_c_rnti, build_dci_f1_0_c_rnti,
    build_dci_f1_0_tc_rnti, build_dci_f1_1_c_rnti, PdschDciParams, PuschDciParams,
};
use super::mcs_tbs::compute_mcs_tbs;
use super::pdcch::{CcePdcchAllocator, PdcchResourceAllocator};
use super::resource_grid::{CellResourceAllocator, RING_ALLOCATOR_SIZE};
use super::result::{
    DciDlRntiConfigType, DciUlRntiConfigType, DlMsgAlloc, DlMsgAllocContext, PdschCodeword, PdschInformation,
    PucchFormat, PuschInformation, UlSchedContext, UlSchedInfo,
};
use super::uci::{PucchUciAllocator, UciAllocator};
use super::ue::UeRepository;
use super::AllocError;
use crate::config::{CellConfig, DlDciFormat, SchedulerExpertConfig, SearchSpaceConfig, SearchSpaceType, UlDciFormat};
use crate::harq::{DlHarqAllocParams, DlTbAllocParams, HarqProcess, UlHarqAllocParams};
use crate::MacError;

/// Largest k1 a fallback DL DCI can signal
const MAX_K1_FALLBACK: u8 = 8;

/// PDSCH grant request for a UE
#[derive(Debug, Clone, Copy)]
pub struct UePdschGrant {
    pub ue_index: DuUeIndex,
    pub cell_index: DuCellIndex,
    pub h_id: HarqId,
    pub ss_id: SearchSpaceId,
    pub aggr_lvl: AggregationLevel,
    /// Row of the PDSCH time domain allocation list
    pub time_res_index: usize,
    pub crbs: CrbInterval,
    /// Highest MCS for a new transmission. Ignored for retransmissions.
    pub mcs: u8,
}

/// PUSCH grant request for a UE
#[derive(Debug, Clone, Copy)]
pub struct UePuschGrant {
    pub ue_index: DuUeIndex,
    pub cell_index: DuCellIndex,
    pub h_id: HarqId,
    pub ss_id: SearchSpaceId,
    pub aggr_lvl: AggregationLevel,
    /// Row of the PUSCH time domain allocation list
    pub time_res_index: usize,
    pub crbs: CrbInterval,
    /// Highest MCS for a new transmission. Ignored for retransmissions.
    pub mcs: u8,
}

/// Per-cell state used by the grant allocator
struct CellContext {
    cfg: CellConfig,
    /// k1 candidates per slot index of the TDD period
    k1_table: Vec<Vec<u8>>,
    res_alloc: CellResourceAllocator,
    pdcch_alloc: Box<dyn PdcchResourceAllocator>,
    uci_alloc: Box<dyn UciAllocator>,
}

/// Grant allocator over the cells of the DU
pub struct UeCellGridAllocator {
    expert_cfg: SchedulerExpertConfig,
    cells: BTreeMap<DuCellIndex, CellContext>,
}

impl UeCellGridAllocator {
    pub fn new(expert_cfg: SchedulerExpertConfig) -> Self {
        Self { expert_cfg, cells: BTreeMap::new() }
    }

    /// Add a cell served by the default PDCCH and PUCCH allocators
    pub fn add_cell(&mut self, cfg: CellConfig) -> Result<(), MacError> {
        let pdcch_alloc = CcePdcchAllocator::new(cfg.coreset_nof_cces, self.expert_cfg.max_pdcchs_per_slot);
        let uci_alloc = PucchUciAllocator::new(
            cfg.nof_pucch_resources,
            self.expert_cfg.max_pucchs_per_slot,
            self.expert_cfg.max_harq_bits_per_pucch_f1,
            self.expert_cfg.max_harq_bits_per_pucch_f2,
        );
        self.add_cell_with(cfg, Box::new(pdcch_alloc), Box::new(uci_alloc))
    }

    /// Add a cell with the given PDCCH and UCI allocators
    pub fn add_cell_with(
        &mut self,
        cfg: CellConfig,
        pdcch_alloc: Box<dyn PdcchResourceAllocator>,
        uci_alloc: Box<dyn UciAllocator>,
    ) -> Result<(), MacError> {
        cfg.validate()?;
        if self.cells.contains_key(&cfg.cell_index) {
            return Err(MacError::InvalidConfiguration(format!(
                "Cell {:?} already added",
                cfg.cell_index
            )));
        }
        let res_alloc = CellResourceAllocator::new(cfg.scs.numerology(), cfg.bwp_crbs.stop);
        let ctx = CellContext { k1_table: cfg.tdd_k1_table(), res_alloc, pdcch_alloc, uci_alloc, cfg };
        self.cells.insert(ctx.cfg.cell_index, ctx);
        Ok(())
    }

    /// Start scheduling `slot_tx` in every cell
    pub fn slot_indication(&mut self, slot_tx: SlotPoint) {
        for cell in self.cells.values_mut() {
            cell.res_alloc.slot_indication(slot_tx);
        }
    }

    pub fn cell_config(&self, cell_index: DuCellIndex) -> Option<&CellConfig> {
        self.cells.get(&cell_index).map(|c| &c.cfg)
    }

    /// Grids and results of a cell
    pub fn res_alloc(&self, cell_index: DuCellIndex) -> Option<&CellResourceAllocator> {
        self.cells.get(&cell_index).map(|c| &c.res_alloc)
    }

    /// Commit a PDSCH grant in the current slot
    pub fn allocate_dl_grant(&mut self, ues: &mut UeRepository, grant: &UePdschGrant) -> Result<(), AllocError> {
        let res = self.try_allocate_dl_grant(ues, grant);
        if let Err(e) = &res {
            debug!(ue = grant.ue_index.0, h_id = %grant.h_id, "DL grant rejected: {}", e);
        }
        res
    }

    /// Commit a PUSCH grant scheduled from the current slot
    pub fn allocate_ul_grant(&mut self, ues: &mut UeRepository, grant: &UePuschGrant) -> Result<(), AllocError> {
        let res = self.try_allocate_ul_grant(ues, grant);
        if let Err(e) = &res {
            debug!(ue = grant.ue_index.0, h_id = %grant.h_id, "UL grant rejected: {}", e);
        }
        res
    }

    fn try_allocate_dl_grant(&mut self, ues: &mut UeRepository, grant: &UePdschGrant) -> Result<(), AllocError> {
        let expert_cfg = &self.expert_cfg;
        let ue = ues.get_mut(grant.ue_index).ok_or(AllocError::UeNotFound(grant.ue_index))?;
        let crnti = ue.crnti();
        let conres_pending = ue.is_conres_pending();
        let cell = self
            .cells
            .get_mut(&grant.cell_index)
            .ok_or(AllocError::CellNotConfigured(grant.cell_index))?;
        let ue_cell = ue
            .find_cell_mut(grant.cell_index)
            .ok_or(AllocError::CellNotConfigured(grant.cell_index))?;
        if !ue_cell.active {
            return Err(AllocError::UeInactive);
        }
        if !ue_cell.is_search_space_configured(grant.ss_id) {
            return Err(AllocError::SearchSpaceNotConfigured(grant.ss_id));
        }
        let ss_cfg = cell
            .cfg
            .find_search_space(grant.ss_id)
            .ok_or(AllocError::SearchSpaceNotConfigured(grant.ss_id))?;
        let (cqi, nof_layers, max_retxs) = (ue_cell.cqi, ue_cell.nof_dl_layers, ue_cell.max_nof_harq_retxs);

        let h_dl = ue_cell
            .harqs
            .dl_harq_mut(grant.h_id)
            .ok_or(AllocError::InvalidHarqId(grant.h_id))?;
        let is_retx = !h_dl.empty();
        if is_retx && !h_dl.has_pending_retx() {
            return Err(AllocError::HarqBusy(grant.h_id));
        }
        let prev_params = h_dl.last_alloc_params().clone();

        let dci_type = if is_retx {
            prev_params.dci_cfg_type
        } else if conres_pending {
            DciDlRntiConfigType::TcRntiF1_0
        } else if ss_cfg.ss_type == SearchSpaceType::UeSpecific && ss_cfg.dl_dci_format == DlDciFormat::F1_1 {
            DciDlRntiConfigType::CRntiF1_1
        } else {
            DciDlRntiConfigType::CRntiF1_0
        };
        validate_search_space(
            &cell.cfg,
            ss_cfg,
            grant.aggr_lvl,
            dci_type == DciDlRntiConfigType::TcRntiF1_0,
            dci_type.is_fallback() == (ss_cfg.dl_dci_format == DlDciFormat::F1_0),
        )?;

        let td = *cell
            .cfg
            .pdsch_td_alloc_list
            .get(grant.time_res_index)
            .ok_or(AllocError::InvalidTimeResource(grant.time_res_index))?;
        let k0 = td.k0 as u32;
        if k0 as usize >= RING_ALLOCATOR_SIZE {
            return Err(AllocError::SlotOutOfWindow);
        }
        let pdcch_slot = cell.res_alloc.slot_alloc(0).slot;
        let pdsch_slot = pdcch_slot + k0;
        if !cell.cfg.is_dl_enabled(pdcch_slot) || !cell.cfg.is_dl_enabled(pdsch_slot) {
            return Err(AllocError::DlDisabled);
        }
        let pdcch_res = &cell.res_alloc.slot_alloc(0).result;
        if pdcch_res.dl.dl_pdcchs.len() + pdcch_res.dl.ul_pdcchs.len() >= expert_cfg.max_pdcchs_per_slot {
            return Err(AllocError::PdcchListFull);
        }
        let pdsch_alloc = cell.res_alloc.slot_alloc(k0);
        if pdsch_alloc.result.dl.ue_grants.len() >= expert_cfg.max_pdschs_per_slot {
            return Err(AllocError::PdschListFull);
        }
        if pdsch_alloc.result.dl.ue_grants.iter().any(|g| g.pdsch_cfg.rnti == crnti) {
            return Err(AllocError::UeAlreadyScheduled);
        }
        if grant.crbs.is_empty() || !cell.cfg.bwp_crbs.contains(&grant.crbs) {
            return Err(AllocError::CrbsOutsideBwp(grant.crbs));
        }
        if is_retx && grant.crbs.length() != prev_params.prbs.length() {
            return Err(AllocError::RetxShapeMismatch {
                nof_crbs: grant.crbs.length(),
                expected: prev_params.prbs.length(),
            });
        }
        if pdsch_alloc.dl_res_grid.collides(td.symbols, grant.crbs) {
            return Err(AllocError::CrbCollision(grant.crbs));
        }

        let (mcs, tbs_bytes) = if is_retx {
            let Some(prev_tb) = prev_params.tb[0] else {
                panic!("DL HARQ rnti={} h_id={} pending retransmission without allocation", crnti, grant.h_id);
            };
            (prev_tb.mcs, prev_tb.tbs_bytes)
        } else {
            let mcs_tbs = compute_mcs_tbs(
                grant.mcs,
                grant.crbs.length() as u32,
                td.symbols.length() as u32,
                nof_layers as u32,
                expert_cfg.max_code_rate,
            )
            .ok_or(AllocError::NoValidMcs)?;
            (mcs_tbs.mcs, mcs_tbs.tbs_bytes)
        };

        let pdcch_idx = cell
            .pdcch_alloc
            .alloc_dl_pdcch_ue(cell.res_alloc.slot_alloc_mut(0), crnti, ss_cfg, grant.aggr_lvl)
            .ok_or(AllocError::NoPdcchSpace)?;

        // TC-RNTI HARQ-ACK goes on a common PUCCH resource, format 1 only
        let pucch_formats: &[PucchFormat] = if dci_type == DciDlRntiConfigType::TcRntiF1_0 {
            &[PucchFormat::F1]
        } else {
            &[PucchFormat::F1, PucchFormat::F2]
        };
        let k1_candidates = k1_candidates(&cell.cfg, &cell.k1_table, pdsch_slot);
        let mut uci = None;
        'search: for &max_format in pucch_formats {
            for &k1 in k1_candidates {
                if dci_type.is_fallback() && k1 > MAX_K1_FALLBACK {
                    continue;
                }
                let offset = k0 + k1 as u32;
                if offset as usize >= RING_ALLOCATOR_SIZE || !cell.cfg.is_ul_enabled(pdsch_slot + k1 as u32) {
                    continue;
                }
                let slot_alloc = cell.res_alloc.slot_alloc_mut(offset);
                if let Some(alloc) = cell.uci_alloc.alloc_uci_harq_ue(slot_alloc, crnti, max_format) {
                    uci = Some((k1, alloc));
                    break 'search;
                }
            }
        }
        let Some((k1, uci)) = uci else {
            cell.pdcch_alloc.cancel_last_pdcch(cell.res_alloc.slot_alloc_mut(0));
            return Err(AllocError::NoPucchSpace);
        };

        // Commit
        cell.res_alloc.slot_alloc_mut(k0).dl_res_grid.fill(td.symbols, grant.crbs);
        if is_retx {
            h_dl.new_retx(pdsch_slot, k1 as u32, uci.harq_bit_idx);
        } else {
            h_dl.new_tx(pdsch_slot, k1 as u32, max_retxs, uci.harq_bit_idx);
        }
        h_dl.increment_pucch_counter();

        let dci_params = PdschDciParams {
            bwp_crbs: cell.cfg.bwp_crbs,
            crbs: grant.crbs,
            time_resource: grant.time_res_index as u8,
            k1,
            pucch_res_indicator: uci.pucch_res_indicator,
            dai: uci.harq_bit_idx,
            mcs,
        };
        let dci = match dci_type {
            DciDlRntiConfigType::CRntiF1_0 => build_dci_f1_0_c_rnti(&dci_params, h_dl),
            DciDlRntiConfigType::TcRntiF1_0 => build_dci_f1_0_tc_rnti(&dci_params, h_dl),
            DciDlRntiConfigType::CRntiF1_1 => build_dci_f1_1_c_rnti(&dci_params, &cell.cfg.dl_data_to_ul_ack, h_dl),
        };
        cell.res_alloc.slot_alloc_mut(0).result.dl.dl_pdcchs[pdcch_idx].dci = Some(dci);

        let prbs = crbs_to_prbs(cell.cfg.bwp_crbs, grant.crbs);
        let tb = h_dl.tb(0);
        let pdsch = DlMsgAlloc {
            pdsch_cfg: PdschInformation {
                rnti: crnti,
                prbs,
                symbols: td.symbols,
                codewords: vec![PdschCodeword { mcs, tbs_bytes, rv: tb.rv(), new_data: !is_retx }],
                harq_id: grant.h_id,
                nof_layers,
            },
            context: DlMsgAllocContext {
                ue_index: grant.ue_index,
                ss_id: grant.ss_id,
                k1,
                nof_retxs: tb.nof_retxs(),
            },
        };
        cell.res_alloc.slot_alloc_mut(k0).result.dl.ue_grants.push(pdsch);

        h_dl.save_alloc_params(DlHarqAllocParams {
            dci_cfg_type: dci_type,
            prbs,
            nof_symbols: td.symbols.length(),
            tb: [Some(DlTbAllocParams { mcs, tbs_bytes }), None],
            cqi,
            nof_layers,
        });

        debug!(
            rnti = %crnti, h_id = %grant.h_id,
            "DL grant: pdsch_slot={} crbs={} mcs={} tbs={} k1={} retx={}",
            pdsch_slot, grant.crbs, mcs, tbs_bytes, k1, is_retx
        );
        Ok(())
    }

    fn try_allocate_ul_grant(&mut self, ues: &mut UeRepository, grant: &UePuschGrant) -> Result<(), AllocError> {
        let expert_cfg = &self.expert_cfg;
        let ue = ues.get_mut(grant.ue_index).ok_or(AllocError::UeNotFound(grant.ue_index))?;
        let crnti = ue.crnti();
        let conres_pending = ue.is_conres_pending();
        let cell = self
            .cells
            .get_mut(&grant.cell_index)
            .ok_or(AllocError::CellNotConfigured(grant.cell_index))?;
        let ue_cell = ue
            .find_cell_mut(grant.cell_index)
            .ok_or(AllocError::CellNotConfigured(grant.cell_index))?;
        if !ue_cell.active {
            return Err(AllocError::UeInactive);
        }
        if !ue_cell.is_search_space_configured(grant.ss_id) {
            return Err(AllocError::SearchSpaceNotConfigured(grant.ss_id));
        }
        let ss_cfg = cell
            .cfg
            .find_search_space(grant.ss_id)
            .ok_or(AllocError::SearchSpaceNotConfigured(grant.ss_id))?;
        let max_retxs = ue_cell.max_nof_harq_retxs;

        let h_ul = ue_cell
            .harqs
            .ul_harq_mut(grant.h_id)
            .ok_or(AllocError::InvalidHarqId(grant.h_id))?;
        let is_retx = !h_ul.empty();
        if is_retx && !h_ul.has_pending_retx() {
            return Err(AllocError::HarqBusy(grant.h_id));
        }
        let prev_params = h_ul.last_alloc_params().clone();

        let dci_type = if is_retx {
            prev_params.dci_cfg_type
        } else if conres_pending {
            DciUlRntiConfigType::TcRntiF0_0
        } else if ss_cfg.ss_type == SearchSpaceType::UeSpecific && ss_cfg.ul_dci_format == UlDciFormat::F0_1 {
            DciUlRntiConfigType::CRntiF0_1
        } else {
            DciUlRntiConfigType::CRntiF0_0
        };
        validate_search_space(
            &cell.cfg,
            ss_cfg,
            grant.aggr_lvl,
            dci_type == DciUlRntiConfigType::TcRntiF0_0,
            dci_type.is_fallback() == (ss_cfg.ul_dci_format == UlDciFormat::F0_0),
        )?;

        let td = *cell
            .cfg
            .pusch_td_alloc_list
            .get(grant.time_res_index)
            .ok_or(AllocError::InvalidTimeResource(grant.time_res_index))?;
        let k2 = td.k2 as u32;
        if k2 as usize >= RING_ALLOCATOR_SIZE {
            return Err(AllocError::SlotOutOfWindow);
        }
        let pdcch_slot = cell.res_alloc.slot_alloc(0).slot;
        let pusch_slot = pdcch_slot + k2;
        if !cell.cfg.is_dl_enabled(pdcch_slot) {
            return Err(AllocError::DlDisabled);
        }
        if !cell.cfg.is_ul_enabled(pusch_slot) {
            return Err(AllocError::UlDisabled);
        }
        let pdcch_res = &cell.res_alloc.slot_alloc(0).result;
        if pdcch_res.dl.dl_pdcchs.len() + pdcch_res.dl.ul_pdcchs.len() >= expert_cfg.max_pdcchs_per_slot {
            return Err(AllocError::PdcchListFull);
        }
        let pusch_alloc = cell.res_alloc.slot_alloc(k2);
        if pusch_alloc.result.ul.puschs.len() >= expert_cfg.max_puschs_per_slot {
            return Err(AllocError::PuschListFull);
        }
        if pusch_alloc.result.ul.puschs.iter().any(|p| p.pusch_cfg.rnti == crnti) {
            return Err(AllocError::UeAlreadyScheduled);
        }
        if grant.crbs.is_empty() || !cell.cfg.bwp_crbs.contains(&grant.crbs) {
            return Err(AllocError::CrbsOutsideBwp(grant.crbs));
        }
        if is_retx && grant.crbs.length() != prev_params.prbs.length() {
            return Err(AllocError::RetxShapeMismatch {
                nof_crbs: grant.crbs.length(),
                expected: prev_params.prbs.length(),
            });
        }
        if pusch_alloc.ul_res_grid.collides(td.symbols, grant.crbs) {
            return Err(AllocError::CrbCollision(grant.crbs));
        }

        let (mcs, tbs_bytes) = if is_retx {
            (prev_params.mcs, prev_params.tbs_bytes)
        } else {
            let mcs_tbs = compute_mcs_tbs(
                grant.mcs,
                grant.crbs.length() as u32,
                td.symbols.length() as u32,
                1,
                expert_cfg.max_code_rate,
            )
            .ok_or(AllocError::NoValidMcs)?;
            (mcs_tbs.mcs, mcs_tbs.tbs_bytes)
        };

        let pdcch_idx = cell
            .pdcch_alloc
            .alloc_ul_pdcch_ue(cell.res_alloc.slot_alloc_mut(0), crnti, ss_cfg, grant.aggr_lvl)
            .ok_or(AllocError::NoPdcchSpace)?;

        // Commit
        cell.res_alloc.slot_alloc_mut(k2).ul_res_grid.fill(td.symbols, grant.crbs);
        if is_retx {
            h_ul.new_retx(pusch_slot);
        } else {
            h_ul.new_tx(pusch_slot, max_retxs);
        }

        // DAI counts the HARQ-ACK bits already multiplexed for this UE in the PUSCH slot
        let dai = cell
            .res_alloc
            .slot_alloc(k2)
            .result
            .ul
            .pucchs
            .iter()
            .find(|p| p.rnti == crnti)
            .map_or(0, |p| p.harq_ack_nof_bits);
        let dci_params = PuschDciParams {
            bwp_crbs: cell.cfg.bwp_crbs,
            crbs: grant.crbs,
            time_resource: grant.time_res_index as u8,
            dai,
            mcs,
        };
        let dci = match dci_type {
            DciUlRntiConfigType::CRntiF0_0 => build_dci_f0_0_c_rnti(&dci_params, h_ul),
            DciUlRntiConfigType::TcRntiF0_0 => build_dci_f0_0_tc_rnti(&dci_params, h_ul),
            DciUlRntiConfigType::CRntiF0_1 => build_dci_f0_1_c_rnti(&dci_params, h_ul),
        };
        cell.res_alloc.slot_alloc_mut(0).result.dl.ul_pdcchs[pdcch_idx].dci = Some(dci);

        let prbs = crbs_to_prbs(cell.cfg.bwp_crbs, grant.crbs);
        let tb = h_ul.tb();
        let pusch = UlSchedInfo {
            pusch_cfg: PuschInformation {
                rnti: crnti,
                prbs,
                symbols: td.symbols,
                mcs,
                tbs_bytes,
                rv: tb.rv(),
                new_data: !is_retx,
                harq_id: grant.h_id,
            },
            uci: None,
            context: UlSchedContext { ue_index: grant.ue_index, ss_id: grant.ss_id, nof_retxs: tb.nof_retxs() },
        };
        let pusch_alloc = cell.res_alloc.slot_alloc_mut(k2);
        pusch_alloc.result.ul.puschs.push(pusch);
        let pusch_idx = pusch_alloc.result.ul.puschs.len() - 1;

        h_ul.save_alloc_params(UlHarqAllocParams {
            dci_cfg_type: dci_type,
            prbs,
            nof_symbols: td.symbols.length(),
            mcs,
            tbs_bytes,
        });

        cell.uci_alloc.multiplex_uci_on_pusch(cell.res_alloc.slot_alloc_mut(k2), pusch_idx);
        ue.reset_sr_indication();

        debug!(
            rnti = %crnti, h_id = %grant.h_id,
            "UL grant: pusch_slot={} crbs={} mcs={} tbs={} retx={}",
            pusch_slot, grant.crbs, mcs, tbs_bytes, is_retx
        );
        Ok(())
    }
}

/// SearchSpace checks shared by DL and UL grants
fn validate_search_space(
    cell_cfg: &CellConfig,
    ss_cfg: &SearchSpaceConfig,
    aggr_lvl: AggregationLevel,
    is_tc_rnti: bool,
    format_monitored: bool,
) -> Result<(), AllocError> {
    if ss_cfg.nof_candidates(aggr_lvl) == 0 {
        return Err(AllocError::NoPdcchCandidates(aggr_lvl));
    }
    if is_tc_rnti && ss_cfg.id != cell_cfg.ra_search_space_id {
        return Err(AllocError::InvalidSearchSpace(ss_cfg.id));
    }
    if !format_monitored {
        return Err(AllocError::InvalidSearchSpace(ss_cfg.id));
    }
    Ok(())
}

/// Ordered k1 candidates for a PDSCH in `pdsch_slot`
fn k1_candidates<'a>(cell_cfg: &'a CellConfig, k1_table: &'a [Vec<u8>], pdsch_slot: SlotPoint) -> &'a [u8] {
    match &cell_cfg.tdd_pattern {
        Some(pattern) if cell_cfg.is_tdd() => {
            let idx = (pdsch_slot.count() % pattern.period_slots) as usize;
            k1_table.get(idx).map(|k1s| k1s.as_slice()).unwrap_or(&[])
        }
        _ => cell_cfg.dl_data_to_ul_ack.as_slice(),
    }
}

fn crbs_to_prbs(bwp_crbs: CrbInterval, crbs: CrbInterval) -> PrbInterval {
    PrbInterval::new(crbs.start - bwp_crbs.start, crbs.stop - bwp_crbs.start)
}
