//! Built-in biller catalog

use serde::Serialize;

use super::bill::BillType;

/// A company that issues bills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Biller {
    pub id: &'static str,
    pub name: &'static str,
}

const ELECTRIC: &[Biller] = &[
    Biller { id: "EVN_HCMC", name: "Công ty Điện lực TP.HCM" },
    Biller { id: "EVN_HANOI", name: "Công ty Điện lực Hà Nội" },
    Biller { id: "EVN_DANANG", name: "Công ty Điện lực Đà Nẵng" },
];

const WATER: &[Biller] = &[
    Biller { id: "SAWACO", name: "Công ty Cấp nước Sài Gòn" },
    Biller { id: "HAWACO", name: "Công ty Cấp nước Hà Nội" },
];

const INTERNET: &[Biller] = &[
    Biller { id: "VNPT", name: "VNPT" },
    Biller { id: "VIETTEL", name: "Viettel" },
    Biller { id: "FPT", name: "FPT Telecom" },
];

const TV: &[Biller] = &[
    Biller { id: "VTVCab", name: "VTVCab" },
    Biller { id: "SCTV", name: "SCTV" },
    Biller { id: "K+", name: "K+ Truyền hình" },
];

/// Billers for a bill type (empty for unknown types)
pub fn billers_for(bill_type: &BillType) -> &'static [Biller] {
    match bill_type {
        BillType::Electric => ELECTRIC,
        BillType::Water => WATER,
        BillType::Internet => INTERNET,
        BillType::Tv => TV,
        BillType::Other(_) => &[],
    }
}

/// Every known biller with its bill type
pub fn all_billers() -> Vec<(BillType, Biller)> {
    [BillType::Electric, BillType::Water, BillType::Internet, BillType::Tv]
        .into_iter()
        .flat_map(|t| billers_for(&t).iter().map(move |b| (t.clone(), *b)))
        .collect()
}

/// Find a biller by id, case-insensitively
pub fn find_biller(id: &str) -> Option<(BillType, Biller)> {
    all_billers()
        .into_iter()
        .find(|(_, b)| b.id.eq_ignore_ascii_case(id.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(billers_for(&BillType::Electric).len(), 3);
        assert!(billers_for(&BillType::Other("gas".into())).is_empty());
        assert_eq!(all_billers().len(), 11);
    }

    #[test]
    fn test_find_biller() {
        let (bill_type, biller) = find_biller("sawaco").unwrap();
        assert_eq!(bill_type, BillType::Water);
        assert_eq!(biller.id, "SAWACO");
        assert!(find_biller("NOPE").is_none());
    }
}
