//! Scheduler UE Context
//!
//! Per-UE state the grant allocator reads and updates: active carriers with
//! their HARQ entities, SearchSpaces, channel state and pending requests.

use std::collections::BTreeMap;

use common::types::{DuCellIndex, DuUeIndex, Rnti, SearchSpaceId};
use common::SlotPoint;
use tracing::{debug, info};

use crate::config::{CellConfig, SchedulerExpertConfig};
use crate::harq::{HarqEntity, HarqTimeoutHandler};

/// UE state in one serving cell
#[derive(Debug)]
pub struct UeCell {
    /// Serving cell
    pub cell_index: DuCellIndex,
    /// Carrier is active and can be scheduled
    pub active: bool,
    /// HARQ processes of the UE in this cell
    pub harqs: HarqEntity,
    /// SearchSpaces the UE monitors in this cell
    pub search_spaces: Vec<SearchSpaceId>,
    /// Last reported wideband CQI
    pub cqi: u8,
    /// Number of DL layers
    pub nof_dl_layers: u8,
    /// Maximum HARQ retransmissions per TB
    pub max_nof_harq_retxs: u32,
}

impl UeCell {
    pub fn new(ue_index: DuUeIndex, crnti: Rnti, cell_cfg: &CellConfig, expert_cfg: &SchedulerExpertConfig) -> Self {
        Self {
            cell_index: cell_cfg.cell_index,
            active: true,
            harqs: HarqEntity::new(ue_index, crnti, &expert_cfg.harq, cell_cfg.scs.numerology()),
            search_spaces: cell_cfg.search_spaces.iter().map(|ss| ss.id).collect(),
            cqi: 15,
            nof_dl_layers: 1,
            max_nof_harq_retxs: expert_cfg.harq.max_nof_harq_retxs as u32,
        }
    }

    pub fn is_search_space_configured(&self, ss_id: SearchSpaceId) -> bool {
        self.search_spaces.contains(&ss_id)
    }
}

/// Scheduler UE
#[derive(Debug)]
pub struct Ue {
    ue_index: DuUeIndex,
    crnti: Rnti,
    cells: Vec<UeCell>,
    /// Numerology shared by all the UE carriers, so one slot drives every HARQ entity
    numerology: u8,
    /// Msg4 not yet acknowledged. The UE is addressed by its TC-RNTI.
    conres_pending: bool,
    pending_sr: bool,
}

impl Ue {
    /// UE with its primary cell
    pub fn new(ue_index: DuUeIndex, crnti: Rnti, pcell_cfg: &CellConfig, expert_cfg: &SchedulerExpertConfig) -> Self {
        Self {
            ue_index,
            crnti,
            cells: vec![UeCell::new(ue_index, crnti, pcell_cfg, expert_cfg)],
            numerology: pcell_cfg.scs.numerology(),
            conres_pending: false,
            pending_sr: false,
        }
    }

    pub fn ue_index(&self) -> DuUeIndex {
        self.ue_index
    }

    pub fn crnti(&self) -> Rnti {
        self.crnti
    }

    pub fn add_cell(&mut self, cell_cfg: &CellConfig, expert_cfg: &SchedulerExpertConfig) {
        assert_eq!(
            cell_cfg.scs.numerology(),
            self.numerology,
            "UE {:?}: cell {:?} numerology differs from the other UE carriers",
            self.ue_index,
            cell_cfg.cell_index
        );
        if self.find_cell(cell_cfg.cell_index).is_some() {
            return;
        }
        self.cells.push(UeCell::new(self.ue_index, self.crnti, cell_cfg, expert_cfg));
    }

    pub fn find_cell(&self, cell_index: DuCellIndex) -> Option<&UeCell> {
        self.cells.iter().find(|c| c.cell_index == cell_index)
    }

    pub fn find_cell_mut(&mut self, cell_index: DuCellIndex) -> Option<&mut UeCell> {
        self.cells.iter_mut().find(|c| c.cell_index == cell_index)
    }

    pub fn cells(&self) -> impl Iterator<Item = &UeCell> {
        self.cells.iter()
    }

    /// Attach a timeout handler to the HARQ entities of all the UE cells
    pub fn set_harq_timeout_handler<F>(&mut self, make_handler: F)
    where
        F: Fn() -> Box<dyn HarqTimeoutHandler>,
    {
        for cell in self.cells.iter_mut() {
            cell.harqs.set_timeout_handler(Some(make_handler()));
        }
    }

    pub fn is_conres_pending(&self) -> bool {
        self.conres_pending
    }

    pub fn set_conres_pending(&mut self, pending: bool) {
        self.conres_pending = pending;
    }

    pub fn has_pending_sr(&self) -> bool {
        self.pending_sr
    }

    pub fn handle_sr_indication(&mut self) {
        self.pending_sr = true;
    }

    pub fn reset_sr_indication(&mut self) {
        self.pending_sr = false;
    }

    pub fn slot_indication(&mut self, slot_tx: SlotPoint) {
        for cell in self.cells.iter_mut() {
            cell.harqs.slot_indication(slot_tx);
        }
    }
}

/// UEs of the scheduler, by DU UE index
#[derive(Debug, Default)]
pub struct UeRepository {
    ues: BTreeMap<DuUeIndex, Ue>,
}

impl UeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ue(&mut self, ue: Ue) {
        info!("Adding UE {:?} rnti={}", ue.ue_index(), ue.crnti());
        self.ues.insert(ue.ue_index(), ue);
    }

    pub fn remove_ue(&mut self, ue_index: DuUeIndex) -> Option<Ue> {
        let ue = self.ues.remove(&ue_index);
        if ue.is_some() {
            debug!("Removed UE {:?}", ue_index);
        }
        ue
    }

    pub fn get(&self, ue_index: DuUeIndex) -> Option<&Ue> {
        self.ues.get(&ue_index)
    }

    pub fn get_mut(&mut self, ue_index: DuUeIndex) -> Option<&mut Ue> {
        self.ues.get_mut(&ue_index)
    }

    pub fn contains(&self, ue_index: DuUeIndex) -> bool {
        self.ues.contains_key(&ue_index)
    }

    pub fn len(&self) -> usize {
        self.ues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ue> {
        self.ues.values()
    }

    /// Advance the HARQ clocks of every UE
    pub fn slot_indication(&mut self, slot_tx: SlotPoint) {
        for ue in self.ues.values_mut() {
            ue.slot_indication(slot_tx);
        }
    }
}
