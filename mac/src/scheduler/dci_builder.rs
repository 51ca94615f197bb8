//! DCI Builder
//!
//! Fills DCI formats 0_0, 0_1, 1_0 and 1_1 (TS 38.212 7.3.1) from the
//! allocated resources and the HARQ process state, and packs the fallback
//! formats into their payload bits.

use bytes::Bytes;
use common::types::{CrbInterval, HarqId};
use common::utils::{append_bits, ceil_log2, pack_bits};

use super::result::{DciDlInfo, DciF0_0, DciF0_1, DciF1_0, DciF1_1, DciF1_1Tb, DciUlInfo};
use crate::harq::{DlHarqProcess, HarqProcess, UlHarqProcess};

/// Largest k1 a DCI format 1_0 can signal (3-bit timing indicator)
const MAX_K1_F1_0: u8 = 8;
/// Width of the HARQ process number and time domain resource fields
const NOF_HARQ_ID_BITS: u32 = 4;
const NOF_TIME_RESOURCE_BITS: u32 = 4;

/// Resources of a PDSCH grant signalled in the DCI
#[derive(Debug, Clone, Copy)]
pub struct PdschDciParams {
    /// Active DL BWP
    pub bwp_crbs: CrbInterval,
    /// Allocated CRBs, within the BWP
    pub crbs: CrbInterval,
    /// Row of the PDSCH time domain allocation list
    pub time_resource: u8,
    /// PDSCH to HARQ-ACK delay in slots
    pub k1: u8,
    pub pucch_res_indicator: u8,
    pub dai: u8,
    pub mcs: u8,
}

/// Resources of a PUSCH grant signalled in the DCI
#[derive(Debug, Clone, Copy)]
pub struct PuschDciParams {
    /// Active UL BWP
    pub bwp_crbs: CrbInterval,
    /// Allocated CRBs, within the BWP
    pub crbs: CrbInterval,
    /// Row of the PUSCH time domain allocation list
    pub time_resource: u8,
    pub dai: u8,
    pub mcs: u8,
}

/// Resource indication value of a contiguous allocation (TS 38.214 5.1.2.2.2)
pub fn ra_frequency_type1_riv(n_rb_bwp: u16, rb_start: u16, nof_rbs: u16) -> u32 {
    assert!(
        nof_rbs >= 1 && rb_start + nof_rbs <= n_rb_bwp,
        "Invalid RB allocation start={} length={} in BWP of {} RBs",
        rb_start,
        nof_rbs,
        n_rb_bwp
    );
    let n = n_rb_bwp as u32;
    let start = rb_start as u32;
    let len = nof_rbs as u32;
    if len - 1 <= n / 2 {
        n * (len - 1) + start
    } else {
        n * (n - len + 1) + (n - 1 - start)
    }
}

fn bwp_riv(bwp_crbs: CrbInterval, crbs: CrbInterval) -> u32 {
    assert!(bwp_crbs.contains(&crbs), "CRBs {} outside BWP {}", crbs, bwp_crbs);
    ra_frequency_type1_riv(bwp_crbs.length(), crbs.start - bwp_crbs.start, crbs.length())
}

/// Size of the type 1 frequency domain resource assignment field
fn fdra_nof_bits(n_rb_bwp: u16) -> u32 {
    let n = n_rb_bwp as u32;
    ceil_log2(n * (n + 1) / 2)
}

fn harq_process_number(h_id: HarqId) -> u8 {
    assert!(
        (h_id.0 as u32) < (1 << NOF_HARQ_ID_BITS),
        "h_id={} does not fit the HARQ process number field",
        h_id
    );
    h_id.0
}

fn time_resource(row: u8) -> u8 {
    assert!(
        (row as u32) < (1 << NOF_TIME_RESOURCE_BITS),
        "Time domain resource {} does not fit the DCI field",
        row
    );
    row
}

fn k1_to_f1_0_indicator(k1: u8) -> u8 {
    assert!((1..=MAX_K1_F1_0).contains(&k1), "k1={} cannot be signalled in DCI format 1_0", k1);
    k1 - 1
}

fn build_f1_0(params: &PdschDciParams, h_dl: &DlHarqProcess, dai: u8) -> DciF1_0 {
    let tb = h_dl.tb(0);
    DciF1_0 {
        n_rb_dl_bwp: params.bwp_crbs.length(),
        frequency_resource: bwp_riv(params.bwp_crbs, params.crbs),
        time_resource: time_resource(params.time_resource),
        vrb_to_prb_mapping: 0,
        modulation_coding_scheme: params.mcs,
        new_data_indicator: tb.ndi(),
        redundancy_version: tb.rv(),
        harq_process_number: harq_process_number(h_dl.id()),
        dl_assignment_index: dai,
        tpc_command: 1,
        pucch_resource_indicator: params.pucch_res_indicator,
        pdsch_harq_fb_timing_indicator: k1_to_f1_0_indicator(params.k1),
    }
}

/// DCI format 1_0 scrambled by C-RNTI
pub fn build_dci_f1_0_c_rnti(params: &PdschDciParams, h_dl: &DlHarqProcess) -> DciDlInfo {
    DciDlInfo::CRntiF1_0(build_f1_0(params, h_dl, params.dai % 4))
}

/// DCI format 1_0 scrambled by TC-RNTI. The DAI field is reserved.
pub fn build_dci_f1_0_tc_rnti(params: &PdschDciParams, h_dl: &DlHarqProcess) -> DciDlInfo {
    DciDlInfo::TcRntiF1_0(build_f1_0(params, h_dl, 0))
}

/// DCI format 1_1 scrambled by C-RNTI. k1 is signalled as its position in `dl_data_to_ul_ack`.
pub fn build_dci_f1_1_c_rnti(params: &PdschDciParams, dl_data_to_ul_ack: &[u8], h_dl: &DlHarqProcess) -> DciDlInfo {
    let k1_idx = dl_data_to_ul_ack
        .iter()
        .position(|k1| *k1 == params.k1)
        .unwrap_or_else(|| panic!("k1={} not in dl-DataToUL-ACK {:?}", params.k1, dl_data_to_ul_ack));
    let tb_fields = |tb_idx: usize| {
        let tb = h_dl.tb(tb_idx);
        DciF1_1Tb { modulation_coding_scheme: params.mcs, new_data_indicator: tb.ndi(), redundancy_version: tb.rv() }
    };
    DciDlInfo::CRntiF1_1(DciF1_1 {
        n_rb_dl_bwp: params.bwp_crbs.length(),
        frequency_resource: bwp_riv(params.bwp_crbs, params.crbs),
        time_resource: time_resource(params.time_resource),
        tb1: tb_fields(0),
        tb2: (!h_dl.empty_tb(1)).then(|| tb_fields(1)),
        harq_process_number: harq_process_number(h_dl.id()),
        dl_assignment_index: params.dai % 4,
        tpc_command: 1,
        pucch_resource_indicator: params.pucch_res_indicator,
        pdsch_harq_fb_timing_indicator: k1_idx as u8,
    })
}

fn build_f0_0(params: &PuschDciParams, h_ul: &UlHarqProcess) -> DciF0_0 {
    let tb = h_ul.tb();
    DciF0_0 {
        n_ul_hop: 0,
        n_rb_ul_bwp: params.bwp_crbs.length(),
        frequency_resource: bwp_riv(params.bwp_crbs, params.crbs),
        time_resource: time_resource(params.time_resource),
        frequency_hopping_flag: false,
        modulation_coding_scheme: params.mcs,
        new_data_indicator: tb.ndi(),
        redundancy_version: tb.rv(),
        harq_process_number: harq_process_number(h_ul.id()),
        tpc_command: 1,
    }
}

/// DCI format 0_0 scrambled by C-RNTI
pub fn build_dci_f0_0_c_rnti(params: &PuschDciParams, h_ul: &UlHarqProcess) -> DciUlInfo {
    DciUlInfo::CRntiF0_0(build_f0_0(params, h_ul))
}

/// DCI format 0_0 scrambled by TC-RNTI
pub fn build_dci_f0_0_tc_rnti(params: &PuschDciParams, h_ul: &UlHarqProcess) -> DciUlInfo {
    DciUlInfo::TcRntiF0_0(build_f0_0(params, h_ul))
}

/// DCI format 0_1 scrambled by C-RNTI
pub fn build_dci_f0_1_c_rnti(params: &PuschDciParams, h_ul: &UlHarqProcess) -> DciUlInfo {
    let tb = h_ul.tb();
    DciUlInfo::CRntiF0_1(DciF0_1 {
        n_rb_ul_bwp: params.bwp_crbs.length(),
        frequency_resource: bwp_riv(params.bwp_crbs, params.crbs),
        time_resource: time_resource(params.time_resource),
        frequency_hopping_flag: false,
        modulation_coding_scheme: params.mcs,
        new_data_indicator: tb.ndi(),
        redundancy_version: tb.rv(),
        harq_process_number: harq_process_number(h_ul.id()),
        first_dl_assignment_index: params.dai % 4,
        tpc_command: 1,
    })
}

impl DciF1_0 {
    /// Payload bits, MSB first, zero padded to a byte boundary
    pub fn pack(&self) -> Bytes {
        let mut bits = Vec::with_capacity(48);
        // Identifier for DCI formats: 1 for DL
        append_bits(&mut bits, 1, 1);
        append_bits(&mut bits, self.frequency_resource, fdra_nof_bits(self.n_rb_dl_bwp));
        append_bits(&mut bits, self.time_resource as u32, NOF_TIME_RESOURCE_BITS);
        append_bits(&mut bits, self.vrb_to_prb_mapping as u32, 1);
        append_bits(&mut bits, self.modulation_coding_scheme as u32, 5);
        append_bits(&mut bits, self.new_data_indicator as u32, 1);
        append_bits(&mut bits, self.redundancy_version as u32, 2);
        append_bits(&mut bits, self.harq_process_number as u32, NOF_HARQ_ID_BITS);
        append_bits(&mut bits, self.dl_assignment_index as u32, 2);
        append_bits(&mut bits, self.tpc_command as u32, 2);
        append_bits(&mut bits, self.pucch_resource_indicator as u32, 3);
        append_bits(&mut bits, self.pdsch_harq_fb_timing_indicator as u32, 3);
        pack_bits(&bits)
    }
}

impl DciF0_0 {
    /// Payload bits, MSB first, zero padded to a byte boundary
    pub fn pack(&self) -> Bytes {
        let mut bits = Vec::with_capacity(40);
        // Identifier for DCI formats: 0 for UL
        append_bits(&mut bits, 0, 1);
        // With hopping, the N_UL_hop MSBs of this field carry the hopping offset
        append_bits(&mut bits, self.frequency_resource, fdra_nof_bits(self.n_rb_ul_bwp));
        append_bits(&mut bits, self.time_resource as u32, NOF_TIME_RESOURCE_BITS);
        append_bits(&mut bits, self.frequency_hopping_flag as u32, 1);
        append_bits(&mut bits, self.modulation_coding_scheme as u32, 5);
        append_bits(&mut bits, self.new_data_indicator as u32, 1);
        append_bits(&mut bits, self.redundancy_version as u32, 2);
        append_bits(&mut bits, self.harq_process_number as u32, NOF_HARQ_ID_BITS);
        append_bits(&mut bits, self.tpc_command as u32, 2);
        pack_bits(&bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harq::DlAckStatus;
    use common::types::Rnti;
    use common::SlotPoint;

    fn slot(count: u32) -> SlotPoint {
        SlotPoint::from_count(0, count)
    }

    fn pdsch_params(k1: u8) -> PdschDciParams {
        PdschDciParams {
            bwp_crbs: CrbInterval::new(0, 52),
            crbs: CrbInterval::new(0, 10),
            time_resource: 0,
            k1,
            pucch_res_indicator: 3,
            dai: 5,
            mcs: 20,
        }
    }

    #[test]
    fn test_riv() {
        assert_eq!(ra_frequency_type1_riv(52, 0, 10), 468);
        assert_eq!(ra_frequency_type1_riv(52, 10, 42), 613);
        assert_eq!(ra_frequency_type1_riv(52, 0, 52), 103);
        assert_eq!(ra_frequency_type1_riv(52, 51, 1), 51);
        // Every contiguous allocation maps to a distinct value below N(N+1)/2
        let mut seen = std::collections::HashSet::new();
        for start in 0..24u16 {
            for len in 1..=(24 - start) {
                let riv = ra_frequency_type1_riv(24, start, len);
                assert!(riv < 24 * 25 / 2);
                assert!(seen.insert(riv));
            }
        }
    }

    #[test]
    #[should_panic]
    fn test_riv_outside_bwp_panics() {
        ra_frequency_type1_riv(52, 50, 3);
    }

    #[test]
    fn test_f1_0_from_harq_state() {
        let mut h = DlHarqProcess::new(HarqId(5), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 4, 4, 0);
        let dci = build_dci_f1_0_c_rnti(&pdsch_params(4), &h);
        let DciDlInfo::CRntiF1_0(f1_0) = dci else { panic!("unexpected DCI {:?}", dci) };
        assert_eq!(f1_0.harq_process_number, 5);
        assert!(f1_0.new_data_indicator);
        assert_eq!(f1_0.redundancy_version, 0);
        assert_eq!(f1_0.pdsch_harq_fb_timing_indicator, 3);
        assert_eq!(f1_0.dl_assignment_index, 1);
        assert_eq!(f1_0.frequency_resource, 468);

        h.ack_info(0, DlAckStatus::Nack, None);
        h.new_retx(slot(10), 4, 0);
        let DciDlInfo::CRntiF1_0(retx) = build_dci_f1_0_c_rnti(&pdsch_params(4), &h) else { panic!() };
        assert_eq!(retx.new_data_indicator, f1_0.new_data_indicator);
        assert_eq!(retx.redundancy_version, 2);
    }

    #[test]
    fn test_f1_0_tc_rnti_has_no_dai() {
        let mut h = DlHarqProcess::new(HarqId(0), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 4, 4, 0);
        let dci = build_dci_f1_0_tc_rnti(&pdsch_params(8), &h);
        let DciDlInfo::TcRntiF1_0(f1_0) = dci else { panic!("unexpected DCI {:?}", dci) };
        assert_eq!(f1_0.dl_assignment_index, 0);
        assert_eq!(f1_0.pdsch_harq_fb_timing_indicator, 7);
    }

    #[test]
    #[should_panic]
    fn test_f1_0_k1_too_large_panics() {
        let mut h = DlHarqProcess::new(HarqId(0), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 9, 4, 0);
        build_dci_f1_0_c_rnti(&pdsch_params(9), &h);
    }

    #[test]
    fn test_f1_1_k1_index_and_second_tb() {
        let mut h = DlHarqProcess::new(HarqId(2), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 6, 4, 0);
        let dci = build_dci_f1_1_c_rnti(&pdsch_params(6), &[4, 5, 6, 7, 8], &h);
        let DciDlInfo::CRntiF1_1(f1_1) = dci else { panic!("unexpected DCI {:?}", dci) };
        assert_eq!(f1_1.pdsch_harq_fb_timing_indicator, 2);
        assert!(f1_1.tb2.is_none());
        assert_eq!(f1_1.tb1.modulation_coding_scheme, 20);

        let mut h = DlHarqProcess::new(HarqId(2), Rnti(0x4601), 20, 2560);
        h.tx_2_tb(slot(0), 4, [crate::harq::TbTxRequest::NewTx; 2], 4, 0);
        let DciDlInfo::CRntiF1_1(f1_1) = build_dci_f1_1_c_rnti(&pdsch_params(4), &[4, 5], &h) else { panic!() };
        assert!(f1_1.tb2.is_some());
        assert_eq!(f1_1.pdsch_harq_fb_timing_indicator, 0);
    }

    #[test]
    #[should_panic]
    fn test_f1_1_unknown_k1_panics() {
        let mut h = DlHarqProcess::new(HarqId(0), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 3, 4, 0);
        build_dci_f1_1_c_rnti(&pdsch_params(3), &[4, 5, 6], &h);
    }

    #[test]
    fn test_ul_dcis() {
        let mut h = UlHarqProcess::new(HarqId(7), Rnti(0x4601), 10, 2560);
        h.new_tx(slot(4), 4);
        let params = PuschDciParams {
            bwp_crbs: CrbInterval::new(10, 62),
            crbs: CrbInterval::new(20, 30),
            time_resource: 1,
            dai: 2,
            mcs: 9,
        };
        let DciUlInfo::CRntiF0_0(f0_0) = build_dci_f0_0_c_rnti(&params, &h) else { panic!() };
        assert_eq!(f0_0.frequency_resource, ra_frequency_type1_riv(52, 10, 10));
        assert_eq!(f0_0.harq_process_number, 7);
        assert_eq!(f0_0.time_resource, 1);
        assert!(matches!(build_dci_f0_0_tc_rnti(&params, &h), DciUlInfo::TcRntiF0_0(_)));
        let DciUlInfo::CRntiF0_1(f0_1) = build_dci_f0_1_c_rnti(&params, &h) else { panic!() };
        assert_eq!(f0_1.first_dl_assignment_index, 2);
        assert_eq!(f0_1.new_data_indicator, f0_0.new_data_indicator);
    }

    #[test]
    fn test_pack_f1_0() {
        let mut h = DlHarqProcess::new(HarqId(0), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 4, 4, 0);
        let DciDlInfo::CRntiF1_0(f1_0) = build_dci_f1_0_c_rnti(&pdsch_params(4), &h) else { panic!() };
        let payload = f1_0.pack();
        // 1 + 11 + 4 + 1 + 5 + 1 + 2 + 4 + 2 + 2 + 3 + 3 = 39 bits
        assert_eq!(payload.len(), 5);
        // Identifier, then RIV 468 = 0b00111010100
        assert_eq!(payload[0], 0x9D);
        // Last bits: PRI 3 (011), timing indicator 3 (011), one padding bit
        assert_eq!(payload[4] & 0x7E, 0b0011_0110);
    }

    #[test]
    fn test_pack_f0_0() {
        let mut h = UlHarqProcess::new(HarqId(0), Rnti(0x4601), 10, 2560);
        h.new_tx(slot(4), 4);
        let params = PuschDciParams {
            bwp_crbs: CrbInterval::new(0, 52),
            crbs: CrbInterval::new(0, 10),
            time_resource: 0,
            dai: 0,
            mcs: 9,
        };
        let DciUlInfo::CRntiF0_0(f0_0) = build_dci_f0_0_c_rnti(&params, &h) else { panic!() };
        let payload = f0_0.pack();
        // 1 + 11 + 4 + 1 + 5 + 1 + 2 + 4 + 2 = 31 bits
        assert_eq!(payload.len(), 4);
        assert_eq!(payload[0], 0x1D);
    }

    #[test]
    fn test_highest_harq_id_is_packed() {
        let mut h15 = DlHarqProcess::new(HarqId(15), Rnti(0x4601), 20, 2560);
        let mut h1 = DlHarqProcess::new(HarqId(1), Rnti(0x4601), 20, 2560);
        h15.new_tx(slot(0), 4, 4, 0);
        h1.new_tx(slot(0), 4, 4, 0);
        let DciDlInfo::CRntiF1_0(dci15) = build_dci_f1_0_c_rnti(&pdsch_params(4), &h15) else { panic!() };
        let DciDlInfo::CRntiF1_0(dci1) = build_dci_f1_0_c_rnti(&pdsch_params(4), &h1) else { panic!() };
        assert_eq!(dci15.harq_process_number, 15);
        assert_ne!(dci15.pack(), dci1.pack());
    }

    #[test]
    #[should_panic]
    fn test_harq_id_beyond_dci_field_panics() {
        let mut h = DlHarqProcess::new(HarqId(17), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 4, 4, 0);
        build_dci_f1_0_c_rnti(&pdsch_params(4), &h);
    }

    #[test]
    #[should_panic]
    fn test_ul_harq_id_beyond_dci_field_panics() {
        let mut h = UlHarqProcess::new(HarqId(16), Rnti(0x4601), 10, 2560);
        h.new_tx(slot(4), 4);
        let params = PuschDciParams {
            bwp_crbs: CrbInterval::new(0, 52),
            crbs: CrbInterval::new(0, 10),
            time_resource: 0,
            dai: 0,
            mcs: 9,
        };
        build_dci_f0_0_c_rnti(&params, &h);
    }

    #[test]
    #[should_panic]
    fn test_time_resource_beyond_dci_field_panics() {
        let mut h = DlHarqProcess::new(HarqId(0), Rnti(0x4601), 20, 2560);
        h.new_tx(slot(0), 4, 4, 0);
        let params = PdschDciParams { time_resource: 16, ..pdsch_params(4) };
        build_dci_f1_0_c_rnti(&params, &h);
    }
}
