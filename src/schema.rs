#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Float,
    Timestamp,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Timestamp => "timestamp",
        }
    }
}

pub const PROVIDER: &str = "provider";
pub const STORE: &str = "store";
pub const TRANSACTION_ID: &str = "transaction_id";
pub const ORDER_DATE: &str = "order_date";
pub const PAYMENT_TYPE: &str = "payment_type";
pub const SUBTOTAL: &str = "subtotal";
pub const TIP: &str = "tip";
pub const TAX: &str = "tax";
pub const TAX_WITHHELD: &str = "tax_withheld";
pub const DELIVERY_CHARGE: &str = "delivery_charge";
pub const TOTAL_BEFORE_FEES: &str = "total_before_fees";
pub const SERVICE_FEE: &str = "service_fee";
pub const MARKETING_FEE: &str = "marketing_fee";
pub const ADJUSTMENT_FEE: &str = "adjustment_fee";
pub const MERCHANT_PROCESSING_FEE: &str = "merchant_processing_fee";
pub const COMMISSION_FEE: &str = "commission_fee";
pub const TOTAL_AFTER_FEES: &str = "total_after_fees";
pub const PAYOUT: &str = "payout";
pub const NOTES: &str = "notes";

const COLUMNS: &[(&str, ColumnType)] = &[
    (PROVIDER, ColumnType::String),
    (STORE, ColumnType::String),
    (TRANSACTION_ID, ColumnType::String),
    (ORDER_DATE, ColumnType::Timestamp),
    (PAYMENT_TYPE, ColumnType::String),
    (SUBTOTAL, ColumnType::Float),
    (TIP, ColumnType::Float),
    (TAX, ColumnType::Float),
    (TAX_WITHHELD, ColumnType::Float),
    (DELIVERY_CHARGE, ColumnType::Float),
    (TOTAL_BEFORE_FEES, ColumnType::Float),
    (SERVICE_FEE, ColumnType::Float),
    (MARKETING_FEE, ColumnType::Float),
    (ADJUSTMENT_FEE, ColumnType::Float),
    (MERCHANT_PROCESSING_FEE, ColumnType::Float),
    (COMMISSION_FEE, ColumnType::Float),
    (TOTAL_AFTER_FEES, ColumnType::Float),
    (PAYOUT, ColumnType::Float),
    (NOTES, ColumnType::String),
];

/// Components summed into `total_before_fees`.
pub const BEFORE_FEES_COMPONENTS: &[&str] = &[SUBTOTAL, TIP, TAX, TAX_WITHHELD, DELIVERY_CHARGE];

pub fn columns() -> Vec<&'static str> {
    COLUMNS.iter().map(|(name, _)| *name).collect()
}

pub fn fee_columns() -> Vec<&'static str> {
    COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| name.ends_with("_fee"))
        .collect()
}

pub fn type_of(column: &str) -> Option<ColumnType> {
    COLUMNS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, kind)| *kind)
}

pub fn is_canonical(column: &str) -> bool {
    type_of(column).is_some()
}
