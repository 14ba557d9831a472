use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::schema;
use crate::table::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    Ameci,
    Aroma,
}

impl Store {
    pub const ALL: &'static [Store] = &[Store::Ameci, Store::Aroma];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Ameci => "ameci",
            Self::Aroma => "aroma",
        }
    }

    pub fn from_key(key: &str) -> Result<Store> {
        let wanted = key.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|s| s.key() == wanted)
            .copied()
            .ok_or_else(|| TallyError::UnknownStore(key.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Credit,
}

impl PaymentType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Credit => "credit",
        }
    }

    pub fn from_key(key: &str) -> Option<PaymentType> {
        match key.trim() {
            "cash" => Some(Self::Cash),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Orders,
}

impl ReportType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
        }
    }
}

/// One canonical transaction. Field order is the canonical column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub provider: String,
    pub store: String,
    pub transaction_id: String,
    #[serde(with = "timestamp_format")]
    pub order_date: NaiveDateTime,
    pub payment_type: PaymentType,
    pub subtotal: f64,
    pub tip: f64,
    pub tax: f64,
    pub tax_withheld: f64,
    pub delivery_charge: f64,
    pub total_before_fees: f64,
    pub service_fee: f64,
    pub marketing_fee: f64,
    pub adjustment_fee: f64,
    pub merchant_processing_fee: f64,
    pub commission_fee: f64,
    pub total_after_fees: f64,
    pub payout: f64,
    pub notes: String,
}

impl TransactionRecord {
    /// Typed view of one canonical table row.
    pub fn from_row(row: Row<'_>) -> Result<Self> {
        let payment = row.text(schema::PAYMENT_TYPE)?;
        let payment_type = PaymentType::from_key(&payment).ok_or_else(|| TallyError::Other(format!(
            "row {}: payment type {payment:?} is neither cash nor credit",
            row.index()
        )))?;
        Ok(Self {
            provider: row.text(schema::PROVIDER)?,
            store: row.text(schema::STORE)?,
            transaction_id: row.text(schema::TRANSACTION_ID)?,
            order_date: row.timestamp(schema::ORDER_DATE)?,
            payment_type,
            subtotal: row.float(schema::SUBTOTAL)?,
            tip: row.float(schema::TIP)?,
            tax: row.float(schema::TAX)?,
            tax_withheld: row.float(schema::TAX_WITHHELD)?,
            delivery_charge: row.float(schema::DELIVERY_CHARGE)?,
            total_before_fees: row.float(schema::TOTAL_BEFORE_FEES)?,
            service_fee: row.float(schema::SERVICE_FEE)?,
            marketing_fee: row.float(schema::MARKETING_FEE)?,
            adjustment_fee: row.float(schema::ADJUSTMENT_FEE)?,
            merchant_processing_fee: row.float(schema::MERCHANT_PROCESSING_FEE)?,
            commission_fee: row.float(schema::COMMISSION_FEE)?,
            total_after_fees: row.float(schema::TOTAL_AFTER_FEES)?,
            payout: row.float(schema::PAYOUT)?,
            notes: row.text(schema::NOTES)?,
        })
    }
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}
