//! MCS and TBS Derivation
//!
//! Based on 3GPP TS 38.214 5.1.3: 64QAM MCS table and the transport block
//! size procedure, with a single DM-RS symbol per slot and no extra overhead.

/// Highest MCS index of the 64QAM table
pub const MAX_MCS: u8 = 28;

/// Resource elements occupied by one front-loaded DM-RS symbol per PRB
const NOF_DMRS_RE_PER_PRB: u32 = 12;
const NOF_SUBCARRIERS_PER_RB: u32 = 12;
/// Maximum number of REs per PRB counted for TBS purposes
const MAX_RE_PER_PRB: u32 = 156;

/// TS 38.214 Table 5.1.3.1-1: (modulation order, target code rate x 1024)
const MCS_TABLE_64QAM: [(u32, f64); 29] = [
    (2, 120.0),
    (2, 157.0),
    (2, 193.0),
    (2, 251.0),
    (2, 308.0),
    (2, 379.0),
    (2, 449.0),
    (2, 526.0),
    (2, 602.0),
    (2, 679.0),
    (4, 340.0),
    (4, 378.0),
    (4, 434.0),
    (4, 490.0),
    (4, 553.0),
    (4, 616.0),
    (4, 658.0),
    (6, 438.0),
    (6, 466.0),
    (6, 517.0),
    (6, 567.0),
    (6, 616.0),
    (6, 666.0),
    (6, 719.0),
    (6, 772.0),
    (6, 822.0),
    (6, 873.0),
    (6, 910.0),
    (6, 948.0),
];

/// TS 38.214 Table 5.1.3.2-1
const TBS_TABLE: [u32; 93] = [
    24, 32, 40, 48, 56, 64, 72, 80, 88, 96, 104, 112, 120, 128, 136, 144, 152, 160, 168, 176, 184,
    192, 208, 224, 240, 256, 272, 288, 304, 320, 336, 352, 368, 384, 408, 432, 456, 480, 504, 528,
    552, 576, 608, 640, 672, 704, 736, 768, 808, 848, 888, 928, 984, 1032, 1064, 1128, 1160, 1192,
    1224, 1256, 1288, 1320, 1352, 1416, 1480, 1544, 1608, 1672, 1736, 1800, 1864, 1928, 2024, 2088,
    2152, 2216, 2280, 2408, 2472, 2536, 2600, 2664, 2728, 2792, 2856, 2976, 3104, 3240, 3368, 3496,
    3624, 3752, 3824,
];

/// Selected MCS and resulting transport block size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McsTbs {
    pub mcs: u8,
    pub tbs_bytes: u32,
}

/// Modulation order of an MCS index
pub fn modulation_order(mcs: u8) -> u32 {
    MCS_TABLE_64QAM[mcs.min(MAX_MCS) as usize].0
}

/// Target code rate of an MCS index
pub fn target_code_rate(mcs: u8) -> f64 {
    MCS_TABLE_64QAM[mcs.min(MAX_MCS) as usize].1 / 1024.0
}

fn nof_re(nof_prbs: u32, nof_symbols: u32) -> u32 {
    let re_per_prb = (NOF_SUBCARRIERS_PER_RB * nof_symbols).saturating_sub(NOF_DMRS_RE_PER_PRB);
    re_per_prb.min(MAX_RE_PER_PRB) * nof_prbs
}

/// Transport block size in bits. Zero when there are no REs for data.
pub fn tbs_bits(mcs: u8, nof_prbs: u32, nof_symbols: u32, nof_layers: u32) -> u32 {
    let n_re = nof_re(nof_prbs, nof_symbols);
    if n_re == 0 {
        return 0;
    }
    let rate = target_code_rate(mcs);
    let n_info = n_re as f64 * rate * modulation_order(mcs) as f64 * nof_layers as f64;

    if n_info <= 3824.0 {
        let n = (n_info.log2().floor() as i32 - 6).max(3);
        let step = 2f64.powi(n);
        let n_info_q = (step * (n_info / step).floor()).max(24.0) as u32;
        return TBS_TABLE.iter().copied().find(|tbs| *tbs >= n_info_q).unwrap_or(3824);
    }

    let n = (n_info - 24.0).log2().floor() as i32 - 5;
    let step = 2f64.powi(n);
    let n_info_q = (step * ((n_info - 24.0) / step).round()).max(3840.0);
    let tbs = if rate <= 0.25 {
        let c = ((n_info_q + 24.0) / 3816.0).ceil();
        8.0 * c * ((n_info_q + 24.0) / (8.0 * c)).ceil() - 24.0
    } else if n_info_q > 8424.0 {
        let c = ((n_info_q + 24.0) / 8424.0).ceil();
        8.0 * c * ((n_info_q + 24.0) / (8.0 * c)).ceil() - 24.0
    } else {
        8.0 * ((n_info_q + 24.0) / 8.0).ceil() - 24.0
    };
    tbs as u32
}

/// Ratio of TB plus CRC bits to coded bits
pub fn effective_code_rate(tbs_bits: u32, mcs: u8, nof_prbs: u32, nof_symbols: u32, nof_layers: u32) -> f64 {
    let nof_coded_bits = nof_re(nof_prbs, nof_symbols) * modulation_order(mcs) * nof_layers;
    if nof_coded_bits == 0 {
        return f64::INFINITY;
    }
    let crc_bits = if tbs_bits > 3824 { 24 } else { 16 };
    (tbs_bits + crc_bits) as f64 / nof_coded_bits as f64
}

/// Highest MCS not above `max_mcs` whose effective code rate stays within `max_code_rate`
pub fn compute_mcs_tbs(
    max_mcs: u8,
    nof_prbs: u32,
    nof_symbols: u32,
    nof_layers: u32,
    max_code_rate: f64,
) -> Option<McsTbs> {
    (0..=max_mcs.min(MAX_MCS)).rev().find_map(|mcs| {
        let tbs = tbs_bits(mcs, nof_prbs, nof_symbols, nof_layers);
        if tbs == 0 {
            return None;
        }
        let rate = effective_code_rate(tbs, mcs, nof_prbs, nof_symbols, nof_layers);
        (rate <= max_code_rate).then_some(McsTbs { mcs, tbs_bytes: tbs / 8 })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_tbs_from_table() {
        // 1 PRB, 12 symbols, MCS 0: N_RE=132, N_info=30.9 -> 24
        assert_eq!(tbs_bits(0, 1, 12, 1), 24);
        // 10 PRBs, MCS 9: N_info=1750.6 -> 1744 -> 1800
        assert_eq!(tbs_bits(9, 10, 12, 1), 1800);
    }

    #[test]
    fn test_large_tbs() {
        // 10 PRBs, 12 symbols, MCS 28: N_info=7332.2 -> 7296
        assert_eq!(tbs_bits(28, 10, 12, 1), 7296);
        assert!(tbs_bits(28, 10, 12, 2) > 2 * 7000);
    }

    #[test]
    fn test_no_resources() {
        assert_eq!(tbs_bits(10, 0, 12, 1), 0);
        assert_eq!(tbs_bits(10, 10, 1, 1), 0);
        assert_eq!(compute_mcs_tbs(28, 10, 1, 1, 0.95), None);
    }

    #[test]
    fn test_requested_mcs_kept_when_rate_allows() {
        let res = compute_mcs_tbs(28, 10, 12, 1, 0.95).unwrap();
        assert_eq!(res, McsTbs { mcs: 28, tbs_bytes: 912 });
        let res = compute_mcs_tbs(15, 20, 12, 1, 0.95).unwrap();
        assert_eq!(res.mcs, 15);
    }

    #[test]
    fn test_mcs_lowered_to_meet_code_rate() {
        // 1 PRB over 2 symbols leaves 12 REs, the CRC dominates small TBs
        let res = compute_mcs_tbs(28, 1, 2, 1, 0.95).unwrap();
        assert!(res.mcs < 28);
        let tbs = res.tbs_bytes * 8;
        assert!(effective_code_rate(tbs, res.mcs, 1, 2, 1) <= 0.95);
    }

    #[test]
    fn test_no_valid_mcs() {
        assert_eq!(compute_mcs_tbs(5, 1, 2, 1, 0.95), None);
    }
}
