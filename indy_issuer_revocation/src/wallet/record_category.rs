use std::{fmt, str::FromStr};

use crate::errors::error::{err_msg, RevocationError, RevocationErrorKind};

/// Wallet record categories this crate reads or writes.
///
/// The crypto-material categories (`RevReg*`, `CredDef`) mirror what the
/// anoncreds signer persists; the `Issuer*` categories are the lifecycle
/// records owned by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    CredDef,
    RevReg,
    RevRegDef,
    RevRegDefPriv,
    RevRegInfo,
    IssuerRevReg,
    IssuerCredRev,
    RevNotification,
    CredExV1,
    CredExV2,
}

impl RecordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::CredDef => "cred_def",
            RecordCategory::RevReg => "rev_reg",
            RecordCategory::RevRegDef => "rev_reg_def",
            RecordCategory::RevRegDefPriv => "rev_reg_def_priv",
            RecordCategory::RevRegInfo => "rev_reg_info",
            RecordCategory::IssuerRevReg => "issuer_rev_reg",
            RecordCategory::IssuerCredRev => "issuer_cred_rev",
            RecordCategory::RevNotification => "rev_notification",
            RecordCategory::CredExV1 => "cred_ex_v1",
            RecordCategory::CredExV2 => "cred_ex_v2",
        }
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordCategory {
    type Err = RevocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cred_def" => Ok(RecordCategory::CredDef),
            "rev_reg" => Ok(RecordCategory::RevReg),
            "rev_reg_def" => Ok(RecordCategory::RevRegDef),
            "rev_reg_def_priv" => Ok(RecordCategory::RevRegDefPriv),
            "rev_reg_info" => Ok(RecordCategory::RevRegInfo),
            "issuer_rev_reg" => Ok(RecordCategory::IssuerRevReg),
            "issuer_cred_rev" => Ok(RecordCategory::IssuerCredRev),
            "rev_notification" => Ok(RecordCategory::RevNotification),
            "cred_ex_v1" => Ok(RecordCategory::CredExV1),
            "cred_ex_v2" => Ok(RecordCategory::CredExV2),
            _ => Err(err_msg(
                RevocationErrorKind::InvalidInput,
                format!("Unknown record category: {}", s),
            )),
        }
    }
}
