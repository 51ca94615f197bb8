//! HARQ engine
//!
//! Per-UE DL and UL HARQ processes (TS 38.321 5.3.2 and 5.4.2) and the
//! entity routing UCI and CRC feedback to them.

pub mod dl_process;
pub mod entity;
pub mod process;
pub mod transport_block;
pub mod ul_process;

pub use dl_process::{
    DlAckStatus, DlAckUpdate, DlHarqAllocParams, DlHarqProcess, DlTbAllocParams, TbTxRequest, MAX_NOF_DL_TBS,
    SHORT_ACK_TIMEOUT_DTX,
};
pub use entity::{DlAckInfoResult, HarqEntity, HarqTimeoutHandler};
pub use process::HarqProcess;
pub use transport_block::{HarqState, TransportBlock};
pub use ul_process::{UlHarqAllocParams, UlHarqProcess};
