use serde::{Serialize, Deserialize};

use crate::catalog::{ConnectionType, Region, Tariff};
use crate::event::MediaKind;
use crate::repository::{Record, RecordId};
use crate::role_gate::SubjectId;
use crate::{DateTime, Offset};

mod status;
pub use status::Status;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// New line for a client
    Connection { connection_type: ConnectionType, tariff: Tariff },

    /// Something doesn't work
    Repair { description: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: MediaKind,
    pub reference: String,
}

/// Request of a client, what controllers hand out to technicians
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// None until stored
    pub id: Option<RecordId>,

    pub version: u64,

    pub kind: RequestKind,

    /// Who asked
    pub client: SubjectId,

    /// Where to answer
    pub chat_id: i64,

    pub region: Region,

    pub address: Option<String>,

    /// Latitude and longitude
    pub location: Option<(f64, f64)>,

    pub attachments: Vec<Attachment>,

    pub created_at: DateTime,

    pub assignment: Option<Assignment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub technician: RecordId,
    /// Who made the assignment
    pub by: SubjectId,
    pub at: DateTime,
}

impl ServiceRequest {
    pub fn new(kind: RequestKind, client: SubjectId, chat_id: i64, region: Region) -> ServiceRequest {
        ServiceRequest {
            id: None,
            version: 0,
            kind,
            client,
            chat_id,
            region,
            address: None,
            location: None,
            attachments: Vec::new(),
            created_at: Offset::now(),
            assignment: None,
        }
    }

    pub const fn status(&self) -> Status {
        if self.assignment.is_some() { return Status::Assigned }
        Status::New
    }

    /// Hands the request to `technician`, fails if somebody already did
    pub fn assign(&mut self, technician: RecordId, by: SubjectId) -> Result<(), String> {
        if self.status() != Status::New {
            return Err(format!("request is already {}", self.status()))
        }
        self.assignment = Some(Assignment { technician, by, at: Offset::now() });
        Ok(())
    }

    /// One line for lists
    pub fn summary(&self) -> String {
        let what = match &self.kind {
            RequestKind::Connection { connection_type, tariff } =>
                format!("Connection ({}, {})", connection_type.id(), tariff.id()),
            RequestKind::Repair { description } => {
                let short: String = description.chars().take(40).collect();
                format!("Repair: {short}")
            },
        };
        match self.id {
            Some(id) => format!("#{id} {what}, {}", self.region),
            None => format!("{what}, {}", self.region),
        }
    }
}

impl Record for ServiceRequest {
    fn id(&self) -> Option<RecordId> { self.id }
    fn set_id(&mut self, id: RecordId) { self.id = Some(id) }
    fn version(&self) -> u64 { self.version }
    fn set_version(&mut self, version: u64) { self.version = version }
}

/// Field staff member requests are assigned to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    #[serde(default)]
    pub id: Option<RecordId>,

    #[serde(default)]
    pub version: u64,

    pub name: String,

    pub region: Region,

    /// Telegram user, if the technician uses the bot
    #[serde(default)]
    pub user_id: Option<SubjectId>,
}

impl Record for Technician {
    fn id(&self) -> Option<RecordId> { self.id }
    fn set_id(&mut self, id: RecordId) { self.id = Some(id) }
    fn version(&self) -> u64 { self.version }
    fn set_version(&mut self, version: u64) { self.version = version }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repair() -> ServiceRequest {
        ServiceRequest::new(RequestKind::Repair { description: "No internet since morning".into() },
                            5, 5, Region::Buxoro)
    }

    #[test]
    fn test_assign_only_once() {
        let mut r = repair();
        assert_eq!(Status::New, r.status());
        assert_eq!(Ok(()), r.assign(3, 77));
        assert_eq!(Status::Assigned, r.status());
        assert!(r.assign(4, 78).is_err());
        assert_eq!(Some(3), r.assignment.map(|a| a.technician));
    }

    #[test]
    fn test_summary() {
        let mut r = repair();
        assert_eq!("Repair: No internet since morning, Bukhara", r.summary());
        r.id = Some(12);
        r.kind = RequestKind::Connection {
            connection_type: ConnectionType::B2c, tariff: Tariff::Standard };
        assert_eq!("#12 Connection (b2c, standard), Bukhara", r.summary());
    }

    #[test]
    fn test_technician_from_config_json() {
        let t: Technician = serde_json::from_str(
            r#"{"name": "Aziz", "region": "samarqand"}"#).unwrap();
        assert_eq!(None, t.id);
        assert_eq!(Region::Samarqand, t.region);
    }
}
