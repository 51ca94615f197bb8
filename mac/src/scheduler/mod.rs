//! UE Scheduling
//!
//! Per-cell resource bookkeeping, PDCCH and UCI allocation and the grant
//! allocator turning UE grant requests into DCIs and PDSCH/PUSCH PDUs.

pub mod dci_builder;
pub mod grant_allocator;
pub mod mcs_tbs;
pub mod pdcch;
pub mod resource_grid;
pub mod result;
pub mod uci;
pub mod ue;

use common::types::{AggregationLevel, CrbInterval, DuCellIndex, DuUeIndex, HarqId, SearchSpaceId};
use thiserror::Error;

pub use grant_allocator::{UeCellGridAllocator, UePdschGrant, UePuschGrant};
pub use pdcch::{CcePdcchAllocator, PdcchResourceAllocator};
pub use resource_grid::{CellResourceAllocator, CellSlotResourceAllocator, SlotResourceGrid};
pub use uci::{PucchUciAllocator, UciAllocation, UciAllocator};
pub use ue::{Ue, UeCell, UeRepository};

/// Reasons for rejecting a UE grant. No resource is left reserved when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("UE {0:?} not found")]
    UeNotFound(DuUeIndex),

    #[error("Cell {0:?} is not configured")]
    CellNotConfigured(DuCellIndex),

    #[error("UE carrier is inactive")]
    UeInactive,

    #[error("Invalid HARQ id {0}")]
    InvalidHarqId(HarqId),

    #[error("HARQ {0} is waiting for feedback")]
    HarqBusy(HarqId),

    #[error("SearchSpace {0:?} is not configured for the UE")]
    SearchSpaceNotConfigured(SearchSpaceId),

    #[error("SearchSpace {0:?} cannot carry the DCI format")]
    InvalidSearchSpace(SearchSpaceId),

    #[error("No PDCCH candidates at aggregation level {0:?}")]
    NoPdcchCandidates(AggregationLevel),

    #[error("Invalid time domain resource index {0}")]
    InvalidTimeResource(usize),

    #[error("DL is disabled in the slot")]
    DlDisabled,

    #[error("UL is disabled in the slot")]
    UlDisabled,

    #[error("Slot is outside the resource allocator window")]
    SlotOutOfWindow,

    #[error("PDCCH list is full")]
    PdcchListFull,

    #[error("PDSCH list is full")]
    PdschListFull,

    #[error("PUSCH list is full")]
    PuschListFull,

    #[error("UE already has a grant in the slot")]
    UeAlreadyScheduled,

    #[error("CRBs {0} outside the active BWP")]
    CrbsOutsideBwp(CrbInterval),

    #[error("Retransmission over {nof_crbs} CRBs while the original used {expected}")]
    RetxShapeMismatch { nof_crbs: u16, expected: u16 },

    #[error("CRBs {0} collide with allocated resources")]
    CrbCollision(CrbInterval),

    #[error("No PDCCH space")]
    NoPdcchSpace,

    #[error("No PUCCH space for HARQ-ACK")]
    NoPucchSpace,

    #[error("No MCS satisfies the maximum code rate")]
    NoValidMcs,
}
