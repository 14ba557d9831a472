pub mod beyond_menu;
pub mod brygid;
pub mod eatstreet;
pub mod ezcater;
pub mod office_express;
pub mod order_inn;
pub mod slice;
pub mod toast;

use crate::error::{Result, TallyError};
use crate::normalizer;
use crate::pipeline::{RawInput, RunContext};
use crate::settings::Rates;
use crate::table::Table;
use crate::validation::Check;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    BeyondMenu,
    Brygid,
    Eatstreet,
    Ezcater,
    OfficeExpress,
    OrderInn,
    Slice,
    Toast,
}

pub const ALL_PROVIDERS: &[Provider] = &[
    Provider::BeyondMenu,
    Provider::Brygid,
    Provider::Eatstreet,
    Provider::Ezcater,
    Provider::OfficeExpress,
    Provider::OrderInn,
    Provider::Slice,
    Provider::Toast,
];

/// Providers whose reported gross cannot be rebuilt from its parts.
const GROSS_REPORTED_CHECKS: &[Check] = &[
    Check::ColumnsMatch,
    Check::RecordCountMatch,
    Check::TotalAfterFeesAccurate,
    Check::PayoutMatchesAfterFees,
];

impl Provider {
    pub fn key(&self) -> &'static str {
        match self {
            Self::BeyondMenu => "beyond_menu",
            Self::Brygid => "brygid",
            Self::Eatstreet => "eatstreet",
            Self::Ezcater => "ezcater",
            Self::OfficeExpress => "office_express",
            Self::OrderInn => "order_inn",
            Self::Slice => "slice",
            Self::Toast => "toast",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BeyondMenu => "Beyond Menu",
            Self::Brygid => "Brygid",
            Self::Eatstreet => "EatStreet",
            Self::Ezcater => "ezCater",
            Self::OfficeExpress => "Office Express",
            Self::OrderInn => "Order Inn",
            Self::Slice => "Slice",
            Self::Toast => "Toast",
        }
    }

    /// Extension of the raw export handed to the normalizer.
    pub fn raw_extension(&self) -> &'static str {
        match self {
            Self::Brygid => "txt",
            Self::Ezcater => "xlsx",
            _ => "csv",
        }
    }

    pub fn raw_file_count(&self) -> usize {
        1
    }

    /// Columns a raw export must carry to be recognized as this provider's.
    pub fn raw_columns(&self) -> &'static [&'static str] {
        match self {
            Self::BeyondMenu => beyond_menu::RAW_COLUMNS,
            Self::Brygid => brygid::RAW_COLUMNS,
            Self::Eatstreet => eatstreet::RAW_COLUMNS,
            Self::Ezcater => ezcater::RAW_COLUMNS,
            Self::OfficeExpress => office_express::RAW_COLUMNS,
            Self::OrderInn => order_inn::RAW_COLUMNS,
            Self::Slice => slice::RAW_COLUMNS,
            Self::Toast => toast::RAW_COLUMNS,
        }
    }

    /// Date column of the processed file, checked against the period.
    pub fn date_column(&self) -> &'static str {
        match self {
            Self::BeyondMenu => "Date",
            Self::Brygid => "DATE",
            Self::Eatstreet => "Date",
            Self::Ezcater => "Event Date",
            Self::OfficeExpress => "Delivery Date",
            Self::OrderInn => "DateWeekEnding",
            Self::Slice => "Date & Time",
            Self::Toast => "Paid Date",
        }
    }

    /// Layout of `date_column`; `None` tries the usual export layouts.
    pub fn date_format(&self) -> Option<&'static str> {
        match self {
            Self::Brygid => Some("%m/%d/%Y %H:%M"),
            Self::Eatstreet => Some("%m/%d/%Y %I:%M %p"),
            Self::Ezcater => Some("%Y-%m-%d %H:%M:%S"),
            Self::OfficeExpress => Some("%m/%d/%Y"),
            _ => None,
        }
    }

    /// Key the preprocess step groups raw rows by, if it aggregates.
    pub fn grouping_key(&self) -> Option<&'static str> {
        match self {
            Self::Toast => Some(toast::ORDER_KEY),
            _ => None,
        }
    }

    pub fn checks(&self) -> &'static [Check] {
        match self {
            Self::BeyondMenu | Self::Slice => GROSS_REPORTED_CHECKS,
            _ => Check::ALL,
        }
    }

    /// Checks for a particular processed table. An empty period normalizes
    /// to a single placeholder row, so row counts are not compared.
    pub fn checks_for(&self, processed: &Table) -> Vec<Check> {
        self.checks()
            .iter()
            .copied()
            .filter(|c| !(processed.is_empty() && *c == Check::RecordCountMatch))
            .collect()
    }

    pub fn detect(&self, raw: &Table) -> bool {
        self.raw_columns().iter().all(|c| raw.has_column(c))
    }

    pub fn preprocess(&self, raw: &RawInput, ctx: &RunContext) -> Result<Table> {
        match self {
            Self::BeyondMenu => beyond_menu::preprocess(raw, ctx),
            Self::Brygid => brygid::preprocess(raw, ctx),
            Self::Eatstreet => eatstreet::preprocess(raw, ctx),
            Self::Ezcater => ezcater::preprocess(raw, ctx),
            Self::OfficeExpress => office_express::preprocess(raw, ctx),
            Self::OrderInn => order_inn::preprocess(raw, ctx),
            Self::Slice => slice::preprocess(raw, ctx),
            Self::Toast => toast::preprocess(raw, ctx),
        }
    }

    /// Processed table to canonical table. A period with no orders yields a
    /// single placeholder row.
    pub fn normalize(&self, processed: &Table, ctx: &RunContext, rates: &Rates) -> Result<Table> {
        if processed.is_empty() {
            return normalizer::placeholder(*self, ctx.store, ctx.start);
        }
        let table = match self {
            Self::BeyondMenu => beyond_menu::normalize(processed, ctx, rates)?,
            Self::Brygid => brygid::normalize(processed, ctx, rates)?,
            Self::Eatstreet => eatstreet::normalize(processed, ctx, rates)?,
            Self::Ezcater => ezcater::normalize(processed, ctx, rates)?,
            Self::OfficeExpress => office_express::normalize(processed, ctx, rates)?,
            Self::OrderInn => order_inn::normalize(processed, ctx, rates)?,
            Self::Slice => slice::normalize(processed, ctx, rates)?,
            Self::Toast => toast::normalize(processed, ctx, rates)?,
        };
        normalizer::finalize(&table)
    }
}

pub fn get_by_key(key: &str) -> Result<Provider> {
    let wanted = key.trim().to_lowercase().replace('-', "_");
    ALL_PROVIDERS
        .iter()
        .find(|p| p.key() == wanted)
        .copied()
        .ok_or_else(|| TallyError::UnknownProvider(key.to_string()))
}

/// The single provider whose raw columns all appear in `raw`.
pub fn detect(raw: &Table) -> Option<Provider> {
    let mut matches = ALL_PROVIDERS.iter().filter(|p| p.detect(raw));
    match (matches.next(), matches.next()) {
        (Some(p), None) => Some(*p),
        _ => None,
    }
}
