#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const MEASUREMENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

fn range_f64(
    field: &'static str,
    got: f64,
    min: f64,
    max: f64,
) -> Result<(), ContractViolation> {
    if !got.is_finite() {
        return Err(ContractViolation::NotFinite { field });
    }
    if got < min || got > max {
        return Err(ContractViolation::InvalidRange {
            field,
            min,
            max,
            got,
        });
    }
    Ok(())
}

fn range_int(
    field: &'static str,
    got: i64,
    min: i64,
    max: i64,
) -> Result<(), ContractViolation> {
    if got < min || got > max {
        return Err(ContractViolation::InvalidRange {
            field,
            min: min as f64,
            max: max as f64,
            got: got as f64,
        });
    }
    Ok(())
}

fn quarter_step(field: &'static str, got: f64) -> Result<(), ContractViolation> {
    let scaled = got * 4.0;
    if (scaled - scaled.round()).abs() > 1e-9 {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be quantized to 0.25 steps",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geschlecht {
    Male,
    Female,
}

impl Geschlecht {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Auge {
    #[serde(rename = "OS")]
    Os,
    #[serde(rename = "OD")]
    Od,
}

impl Auge {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "OS" => Some(Self::Os),
            "OD" => Some(Self::Od),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Os => "OS",
            Self::Od => "OD",
        }
    }
}

/// One fully-populated ICL sizing form submission. Immutable after construction;
/// every field is range-checked in `v1` and re-checked by `validate` at the
/// storage boundary. Serialized field names match the historical warehouse columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub geschlecht: Geschlecht,
    pub alter: u8,
    pub auge: Auge,
    pub implant_size: f64,
    #[serde(rename = "ACD")]
    pub acd: f64,
    #[serde(rename = "ACA_nasal")]
    pub aca_nasal: f64,
    #[serde(rename = "ACA_temporal")]
    pub aca_temporal: f64,
    #[serde(rename = "AtA")]
    pub ata: f64,
    #[serde(rename = "ACW")]
    pub acw: f64,
    #[serde(rename = "ARtAR_LR")]
    pub artar_lr: u16,
    #[serde(rename = "StS")]
    pub sts: f64,
    #[serde(rename = "StS_LR")]
    pub sts_lr: u16,
    #[serde(rename = "CBID")]
    pub cbid: f64,
    #[serde(rename = "CBID_LR")]
    pub cbid_lr: u16,
    #[serde(rename = "mPupil")]
    pub m_pupil: f64,
    #[serde(rename = "WtW_MS_39")]
    pub wtw_ms_39: f64,
    #[serde(rename = "WtW_IOL_Master")]
    pub wtw_iol_master: f64,
    #[serde(rename = "Sphaere")]
    pub sphaere: f64,
    #[serde(rename = "Zylinder")]
    pub zylinder: f64,
    #[serde(rename = "Achse")]
    pub achse: u16,
}

impl MeasurementRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        geschlecht: Geschlecht,
        alter: u8,
        auge: Auge,
        implant_size: f64,
        acd: f64,
        aca_nasal: f64,
        aca_temporal: f64,
        ata: f64,
        acw: f64,
        artar_lr: u16,
        sts: f64,
        sts_lr: u16,
        cbid: f64,
        cbid_lr: u16,
        m_pupil: f64,
        wtw_ms_39: f64,
        wtw_iol_master: f64,
        sphaere: f64,
        zylinder: f64,
        achse: u16,
    ) -> Result<Self, ContractViolation> {
        let record = Self {
            geschlecht,
            alter,
            auge,
            implant_size,
            acd,
            aca_nasal,
            aca_temporal,
            ata,
            acw,
            artar_lr,
            sts,
            sts_lr,
            cbid,
            cbid_lr,
            m_pupil,
            wtw_ms_39,
            wtw_iol_master,
            sphaere,
            zylinder,
            achse,
        };
        record.validate()?;
        Ok(record)
    }
}

impl Validate for MeasurementRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        range_int("alter", i64::from(self.alter), 0, 99)?;
        range_f64("implant_size", self.implant_size, 11.25, 13.75)?;
        quarter_step("implant_size", self.implant_size)?;
        range_f64("ACD", self.acd, 2.0, 4.0)?;
        range_f64("ACA_nasal", self.aca_nasal, 20.0, 60.0)?;
        range_f64("ACA_temporal", self.aca_temporal, 20.0, 60.0)?;
        range_f64("AtA", self.ata, 10.0, 14.0)?;
        range_f64("ACW", self.acw, 10.0, 14.0)?;
        range_int("ARtAR_LR", i64::from(self.artar_lr), 0, 1000)?;
        range_f64("StS", self.sts, 10.0, 14.0)?;
        range_int("StS_LR", i64::from(self.sts_lr), 0, 1000)?;
        range_f64("CBID", self.cbid, 10.0, 14.0)?;
        range_int("CBID_LR", i64::from(self.cbid_lr), 500, 2000)?;
        range_f64("mPupil", self.m_pupil, 3.0, 9.0)?;
        range_f64("WtW_MS_39", self.wtw_ms_39, 10.0, 13.0)?;
        range_f64("WtW_IOL_Master", self.wtw_iol_master, 10.0, 13.0)?;
        range_f64("Sphaere", self.sphaere, -25.0, 0.0)?;
        range_f64("Zylinder", self.zylinder, -5.0, 0.0)?;
        quarter_step("Zylinder", self.zylinder)?;
        range_int("Achse", i64::from(self.achse), 0, 180)?;
        Ok(())
    }
}

/// Input control description for one form field. The rendering surface emits one
/// control per spec and relies on platform-side min/max/step enforcement, so no
/// cross-field validation exists anywhere in the form layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldControl {
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
    Number {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
        decimals: u8,
    },
    Integer {
        min: i64,
        max: i64,
        default: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub label: &'static str,
    pub control: FieldControl,
}

pub const MEASUREMENT_FIELD_SPECS: [FieldSpec; 20] = [
    FieldSpec {
        column: "geschlecht",
        label: "Geschlecht",
        control: FieldControl::Choice {
            options: &["Male", "Female"],
            default: "Male",
        },
    },
    FieldSpec {
        column: "alter",
        label: "Alter",
        control: FieldControl::Integer {
            min: 0,
            max: 99,
            default: 0,
        },
    },
    FieldSpec {
        column: "auge",
        label: "Auge",
        control: FieldControl::Choice {
            options: &["OS", "OD"],
            default: "OS",
        },
    },
    FieldSpec {
        column: "implant_size",
        label: "Implantat_Größe",
        control: FieldControl::Number {
            min: 11.25,
            max: 13.75,
            step: 0.25,
            default: 11.25,
            decimals: 2,
        },
    },
    FieldSpec {
        column: "ACD",
        label: "ACD",
        control: FieldControl::Number {
            min: 2.0,
            max: 4.0,
            step: 0.001,
            default: 3.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "ACA_nasal",
        label: "ACA_nasal",
        control: FieldControl::Number {
            min: 20.0,
            max: 60.0,
            step: 0.001,
            default: 35.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "ACA_temporal",
        label: "ACA_temporal",
        control: FieldControl::Number {
            min: 20.0,
            max: 60.0,
            step: 0.001,
            default: 35.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "AtA",
        label: "AtA",
        control: FieldControl::Number {
            min: 10.0,
            max: 14.0,
            step: 0.001,
            default: 12.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "ACW",
        label: "ACW",
        control: FieldControl::Number {
            min: 10.0,
            max: 14.0,
            step: 0.001,
            default: 11.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "ARtAR_LR",
        label: "ARtAR_LR",
        control: FieldControl::Integer {
            min: 0,
            max: 1000,
            default: 250,
        },
    },
    FieldSpec {
        column: "StS",
        label: "StS",
        control: FieldControl::Number {
            min: 10.0,
            max: 14.0,
            step: 0.001,
            default: 11.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "StS_LR",
        label: "StS_LR",
        control: FieldControl::Integer {
            min: 0,
            max: 1000,
            default: 250,
        },
    },
    FieldSpec {
        column: "CBID",
        label: "CBID",
        control: FieldControl::Number {
            min: 10.0,
            max: 14.0,
            step: 0.001,
            default: 11.0,
            decimals: 3,
        },
    },
    FieldSpec {
        column: "CBID_LR",
        label: "CBID_LR",
        control: FieldControl::Integer {
            min: 500,
            max: 2000,
            default: 1000,
        },
    },
    FieldSpec {
        column: "mPupil",
        label: "mPupil",
        control: FieldControl::Number {
            min: 3.0,
            max: 9.0,
            step: 0.01,
            default: 6.0,
            decimals: 2,
        },
    },
    FieldSpec {
        column: "WtW_MS_39",
        label: "WtW_MS_39",
        control: FieldControl::Number {
            min: 10.0,
            max: 13.0,
            step: 0.01,
            default: 11.0,
            decimals: 2,
        },
    },
    FieldSpec {
        column: "WtW_IOL_Master",
        label: "WtW_IOL_Master",
        control: FieldControl::Number {
            min: 10.0,
            max: 13.0,
            step: 0.1,
            default: 11.0,
            decimals: 1,
        },
    },
    FieldSpec {
        column: "Sphaere",
        label: "Sphäre",
        control: FieldControl::Number {
            min: -25.0,
            max: 0.0,
            step: 0.01,
            default: -3.0,
            decimals: 2,
        },
    },
    FieldSpec {
        column: "Zylinder",
        label: "Zylinder",
        control: FieldControl::Number {
            min: -5.0,
            max: 0.0,
            step: 0.25,
            default: -0.5,
            decimals: 2,
        },
    },
    FieldSpec {
        column: "Achse",
        label: "Achse",
        control: FieldControl::Integer {
            min: 0,
            max: 180,
            default: 90,
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_record() -> MeasurementRecord {
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
    fn valid_record_constructs() {
        let record = sample_record();
        assert!(record.validate().is_ok());
    }

    #[test]
    fn achse_out_of_range_is_rejected() {
        let mut record = sample_record();
        record.achse = 200;
        match record.validate() {
            Err(ContractViolation::InvalidRange { field, .. }) => assert_eq!(field, "Achse"),
            other => panic!("expected Achse range violation, got {other:?}"),
        }
    }

    #[test]
    fn implant_size_must_be_quarter_stepped() {
        let mut record = sample_record();
        record.implant_size = 12.3;
        assert!(matches!(
            record.validate(),
            Err(ContractViolation::InvalidValue {
                field: "implant_size",
                ..
            })
        ));
    }

    #[test]
    fn zylinder_must_be_quarter_stepped() {
        let mut record = sample_record();
        record.zylinder = -0.3;
        assert!(matches!(
            record.validate(),
            Err(ContractViolation::InvalidValue {
                field: "Zylinder",
                ..
            })
        ));
    }

    #[test]
    fn non_finite_measurement_is_rejected() {
        let mut record = sample_record();
        record.acd = f64::NAN;
        assert!(matches!(
            record.validate(),
            Err(ContractViolation::NotFinite { field: "ACD" })
        ));
    }

    #[test]
    fn cbid_lr_lower_bound_is_500() {
        let mut record = sample_record();
        record.cbid_lr = 499;
        assert!(matches!(
            record.validate(),
            Err(ContractViolation::InvalidRange {
                field: "CBID_LR",
                ..
            })
        ));
    }

    #[test]
    fn serialized_field_names_match_warehouse_columns() {
        let value = serde_json::to_value(sample_record()).unwrap();
        let object = value.as_object().unwrap();
        for spec in MEASUREMENT_FIELD_SPECS.iter() {
            assert!(
                object.contains_key(spec.column),
                "missing column {}",
                spec.column
            );
        }
        assert_eq!(object.len(), MEASUREMENT_FIELD_SPECS.len());
        assert_eq!(object["geschlecht"], "Male");
        assert_eq!(object["auge"], "OS");
    }
}
