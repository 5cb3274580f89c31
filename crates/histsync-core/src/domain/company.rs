use serde::Serialize;

use histsync_warehouse::CompanyRecord;

use super::IssuerCode;

/// Company profile published on an issuer's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyProfile {
    pub code: IssuerCode,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub email: Option<String>,
    pub phones: Vec<String>,
}

impl CompanyProfile {
    /// Profile carrying only the issuer code, used when the page yields nothing better.
    pub fn code_only(code: IssuerCode) -> Self {
        Self {
            name: code.as_str().to_string(),
            code,
            address: None,
            city: None,
            state: None,
            email: None,
            phones: Vec::new(),
        }
    }

    pub fn to_record(&self) -> CompanyRecord {
        CompanyRecord {
            code: self.code.as_str().to_string(),
            name: self.name.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            email: self.email.clone(),
            phones: self.phones.clone(),
        }
    }
}
