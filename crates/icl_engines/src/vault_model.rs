#![forbid(unsafe_code)]

use icl_contracts::measurement::MeasurementRecord;
use icl_contracts::submission::DerivedFigures;

/// Coefficients of the fixed linear regression behind the vault estimate.
/// The literals must stay bit-for-bit identical to the fitted model so new rows
/// remain comparable with historical `model_v1` results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VaultModelConfig {
    pub intercept: f64,
    pub ata_coefficient: f64,
    pub sts_cbid_impl_s_coefficient: f64,
    pub sts_cbid_lr_coefficient: f64,
}

impl VaultModelConfig {
    pub fn v1() -> Self {
        Self {
            intercept: 1615.0711983535798,
            ata_coefficient: 63.88600034,
            sts_cbid_impl_s_coefficient: 162.8446239,
            sts_cbid_lr_coefficient: 0.63335823,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultModelRuntime {
    config: VaultModelConfig,
}

impl VaultModelRuntime {
    pub fn new(config: VaultModelConfig) -> Self {
        Self { config }
    }

    /// Pure function of the record: recomputing from the same inputs yields
    /// bit-identical results. Evaluation order matches the historical model.
    pub fn run(&self, record: &MeasurementRecord) -> DerivedFigures {
        let sts_cbid_impl_s = (record.sts + record.cbid) / 2.0 - record.implant_size;
        let sts_cbid_lr = (f64::from(record.sts_lr) + f64::from(record.cbid_lr)) / 2.0;
        let vault = self.config.intercept
            - self.config.ata_coefficient * record.ata
            - self.config.sts_cbid_impl_s_coefficient * sts_cbid_impl_s
            - self.config.sts_cbid_lr_coefficient * sts_cbid_lr;
        DerivedFigures {
            sts_cbid_impl_s,
            sts_cbid_lr,
            vault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icl_contracts::measurement::{Auge, Geschlecht};

    fn reference_record() -> MeasurementRecord {
        MeasurementRecord::v1(
            Geschlecht::Male,
            42,
            Auge::Os,
            12.5,
            3.0,
            35.0,
            35.0,
            12.0,
            11.0,
            250,
            11.0,
            250,
            11.0,
            1000,
            6.0,
            11.0,
            11.0,
            -3.0,
            -0.5,
            90,
        )
        .unwrap()
    }

    #[test]
    fn reference_record_matches_formula() {
        let runtime = VaultModelRuntime::new(VaultModelConfig::v1());
        let figures = runtime.run(&reference_record());
        assert_eq!(figures.sts_cbid_impl_s, (11.0 + 11.0) / 2.0 - 12.5);
        assert_eq!(figures.sts_cbid_impl_s, -1.5);
        assert_eq!(figures.sts_cbid_lr, (250.0 + 1000.0) / 2.0);
        assert_eq!(figures.sts_cbid_lr, 625.0);
        let expected: f64 =
            1615.0711983535798 - 63.88600034 * 12.0 - 162.8446239 * (-1.5) - 0.63335823 * 625.0;
        assert_eq!(figures.vault.to_bits(), expected.to_bits());
        assert!((figures.vault - 696.8572363735798).abs() < 1e-9);
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let runtime = VaultModelRuntime::new(VaultModelConfig::v1());
        let record = reference_record();
        let first = runtime.run(&record);
        let second = runtime.run(&record);
        assert_eq!(first.vault.to_bits(), second.vault.to_bits());
        assert_eq!(
            first.sts_cbid_impl_s.to_bits(),
            second.sts_cbid_impl_s.to_bits()
        );
        assert_eq!(first.sts_cbid_lr.to_bits(), second.sts_cbid_lr.to_bits());
    }

    #[test]
    fn half_valued_lr_average_is_preserved() {
        let mut record = reference_record();
        record.sts_lr = 251;
        let runtime = VaultModelRuntime::new(VaultModelConfig::v1());
        let figures = runtime.run(&record);
        assert_eq!(figures.sts_cbid_lr, 625.5);
    }
}
