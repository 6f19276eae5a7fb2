use std::fmt;
use serde::{Serialize, Deserialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Toshkent,
    ToshkentViloyati,
    Samarqand,
    Buxoro,
    Andijon,
    Fargona,
    Namangan,
    Navoiy,
    Xorazm,
}

impl Region {
    pub const ALL: &'static [Region] =
        &[ Region::Toshkent,
           Region::ToshkentViloyati,
           Region::Samarqand,
           Region::Buxoro,
           Region::Andijon,
           Region::Fargona,
           Region::Namangan,
           Region::Navoiy,
           Region::Xorazm ];

    pub const fn id(self) -> &'static str {
        match self {
            Region::Toshkent         => "toshkent",
            Region::ToshkentViloyati => "toshkent_viloyati",
            Region::Samarqand        => "samarqand",
            Region::Buxoro           => "buxoro",
            Region::Andijon          => "andijon",
            Region::Fargona          => "fargona",
            Region::Namangan         => "namangan",
            Region::Navoiy           => "navoiy",
            Region::Xorazm           => "xorazm",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Region::Toshkent         => "Tashkent city",
            Region::ToshkentViloyati => "Tashkent region",
            Region::Samarqand        => "Samarkand",
            Region::Buxoro           => "Bukhara",
            Region::Andijon          => "Andijan",
            Region::Fargona          => "Fergana",
            Region::Namangan         => "Namangan",
            Region::Navoiy           => "Navoi",
            Region::Xorazm           => "Khorezm",
        }
    }

    pub fn from_id(id: &str) -> Option<Region> {
        Region::ALL.iter().cloned().find(|r| r.id() == id)
    }

    pub fn ids() -> Vec<&'static str> {
        Region::ALL.iter().map(|r| r.id()).collect()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Home users
    B2c,
    /// Companies
    B2b,
}

impl ConnectionType {
    pub const ALL: &'static [ConnectionType] =
        &[ ConnectionType::B2c,
           ConnectionType::B2b ];

    pub const fn id(self) -> &'static str {
        match self {
            ConnectionType::B2c => "b2c",
            ConnectionType::B2b => "b2b",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ConnectionType::B2c => "Private person",
            ConnectionType::B2b => "Company",
        }
    }

    pub fn from_id(id: &str) -> Option<ConnectionType> {
        ConnectionType::ALL.iter().cloned().find(|t| t.id() == id)
    }

    pub fn ids() -> Vec<&'static str> {
        ConnectionType::ALL.iter().map(|t| t.id()).collect()
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tariff {
    Standard,
    Premium,
    Unlimited,
    Corporate,
}

impl Tariff {
    pub const ALL: &'static [Tariff] =
        &[ Tariff::Standard,
           Tariff::Premium,
           Tariff::Unlimited,
           Tariff::Corporate ];

    pub const fn id(self) -> &'static str {
        match self {
            Tariff::Standard  => "standard",
            Tariff::Premium   => "premium",
            Tariff::Unlimited => "unlimited",
            Tariff::Corporate => "corporate",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Tariff::Standard  => "Standard, 50 Mbit/s",
            Tariff::Premium   => "Premium, 100 Mbit/s",
            Tariff::Unlimited => "Unlimited, 200 Mbit/s",
            Tariff::Corporate => "Corporate, dedicated line",
        }
    }

    pub fn from_id(id: &str) -> Option<Tariff> {
        Tariff::ALL.iter().cloned().find(|t| t.id() == id)
    }

    pub fn ids() -> Vec<&'static str> {
        Tariff::ALL.iter().map(|t| t.id()).collect()
    }

    pub const fn is_available_for(self, t: ConnectionType) -> bool {
        match (self, t) {
            (Tariff::Corporate, ConnectionType::B2c) => false,
            (Tariff::Unlimited, ConnectionType::B2b) => false,
            _ => true,
        }
    }

    pub fn available_for(t: ConnectionType) -> Vec<Tariff> {
        Tariff::ALL.iter().cloned().filter(|tariff| tariff.is_available_for(t)).collect()
    }
}

impl fmt::Display for Tariff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
