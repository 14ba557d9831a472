use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::{Result, TallyError};
use crate::importer::{compute_checksum, load_raw};
use crate::models::{ReportType, Store, TransactionRecord};
use crate::providers::Provider;
use crate::settings::{Rates, Settings};
use crate::table::Table;
use crate::validation;

/// Identity of a unit of work. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub provider: Provider,
    pub store: Store,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RunContext {
    pub fn new(provider: Provider, store: Store, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(TallyError::Other(format!(
                "period ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self {
            provider,
            store,
            start,
            end,
        })
    }

    /// `{provider}_{store}_{report}_{MM_DD_YYYY}_{MM_DD_YYYY}.csv`
    pub fn file_name(&self, report: ReportType) -> String {
        format!(
            "{}_{}_{}_{}_{}.csv",
            self.provider.key(),
            self.store.key(),
            report.key(),
            self.start.format("%m_%d_%Y"),
            self.end.format("%m_%d_%Y"),
        )
    }

    pub fn period_start(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN)
    }

    pub fn period_end(&self) -> NaiveDateTime {
        let last = chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(chrono::NaiveTime::MIN);
        self.end.and_time(last)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.period_start() && at <= self.period_end()
    }

    pub fn label(&self) -> String {
        format!(
            "{}/{} {}..{}",
            self.provider.key(),
            self.store.key(),
            self.start,
            self.end
        )
    }
}

/// A loaded raw export plus any summary figures that came with it
/// (e.g. the totals block printed above an order table).
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    pub files: Vec<PathBuf>,
    pub table: Table,
    pub totals: BTreeMap<String, f64>,
}

impl RawInput {
    pub fn load(files: &[PathBuf], totals: BTreeMap<String, f64>) -> Result<Self> {
        let first = files
            .first()
            .ok_or_else(|| TallyError::Other("no raw export given".to_string()))?;
        Ok(Self {
            files: files.to_vec(),
            table: load_raw(first)?,
            totals,
        })
    }

    pub fn from_table(table: Table) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    pub fn total(&self, key: &str) -> Option<f64> {
        self.totals.get(key).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Processed {
    pub path: PathBuf,
    pub table: Table,
}

#[derive(Debug, Clone)]
pub struct Canonical {
    pub path: PathBuf,
    pub table: Table,
    pub records: Vec<TransactionRecord>,
}

/// Where processed and canonical files land.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub processed_dir: PathBuf,
    pub canonical_dir: PathBuf,
}

impl Workspace {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            processed_dir: settings.processed_dir(),
            canonical_dir: settings.canonical_dir(),
        }
    }

    pub fn under(root: &Path) -> Self {
        Self {
            processed_dir: root.join("processed"),
            canonical_dir: root.join("data"),
        }
    }
}

/// Everything needed to run one unit.
#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub context: RunContext,
    pub files: Vec<PathBuf>,
    pub totals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub before_fees: f64,
    pub after_fees: f64,
    pub payout: f64,
}

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub context: RunContext,
    pub processed: PathBuf,
    pub canonical: PathBuf,
    pub rows: usize,
    pub checksums: Vec<(PathBuf, String)>,
    pub totals: Totals,
}

pub fn process(raw: &RawInput, ctx: &RunContext, workspace: &Workspace) -> Result<Processed> {
    let table = ctx.provider.preprocess(raw, ctx)?;
    let path = workspace.processed_dir.join(ctx.file_name(ReportType::Orders));
    table.write_csv_path(&path)?;
    info!(
        provider = ctx.provider.key(),
        store = ctx.store.key(),
        rows = table.len(),
        path = %path.display(),
        "processed"
    );
    Ok(Processed { path, table })
}

pub fn canonicalize(
    processed: &Processed,
    ctx: &RunContext,
    rates: &Rates,
    workspace: &Workspace,
) -> Result<Canonical> {
    let table = ctx.provider.normalize(&processed.table, ctx, rates)?;
    info!(
        provider = ctx.provider.key(),
        store = ctx.store.key(),
        rows = table.len(),
        "normalized"
    );

    let checks = ctx.provider.checks_for(&processed.table);
    validation::run_checks(&checks, &table, &processed.table)?;
    debug!(
        provider = ctx.provider.key(),
        checks = ?checks.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "validated"
    );

    let records = table
        .iter_rows()
        .map(TransactionRecord::from_row)
        .collect::<Result<Vec<_>>>()?;
    let path = workspace.canonical_dir.join(ctx.file_name(ReportType::Orders));
    write_records(&path, &records)?;
    info!(
        provider = ctx.provider.key(),
        store = ctx.store.key(),
        rows = records.len(),
        path = %path.display(),
        "written"
    );
    Ok(Canonical {
        path,
        table,
        records,
    })
}

pub fn write_records(path: &Path, records: &[TransactionRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    if records.is_empty() {
        wtr.write_record(crate::schema::columns())?;
    }
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Load, preprocess, normalize, validate and write one unit.
pub fn run_unit(spec: &UnitSpec, workspace: &Workspace, rates: &Rates) -> Result<UnitOutcome> {
    let ctx = &spec.context;
    let provider = ctx.provider;

    validation::file_count(spec.files.as_slice(), provider.raw_file_count())?;
    validation::file_extension(spec.files.as_slice(), provider.raw_extension())?;
    let checksums = spec
        .files
        .iter()
        .map(|f| Ok((f.clone(), compute_checksum(f)?)))
        .collect::<Result<Vec<_>>>()?;

    let raw = RawInput::load(&spec.files, spec.totals.clone())?;
    info!(
        provider = provider.key(),
        store = ctx.store.key(),
        rows = raw.table.len(),
        "raw export loaded"
    );

    let processed = process(&raw, ctx, workspace)?;
    validation::file_extension(std::slice::from_ref(&processed.path), "csv")?;
    validation::date_range(
        std::slice::from_ref(&processed.path),
        ctx.start,
        ctx.end,
        provider.date_column(),
        provider.date_format(),
    )?;
    if let Some(key) = provider.grouping_key() {
        validation::grouping_cardinality_match(&raw.table, &processed.table, key)?;
    }

    let canonical = canonicalize(&processed, ctx, rates, workspace)?;
    let totals = canonical.records.iter().fold(Totals::default(), |acc, r| Totals {
        before_fees: acc.before_fees + r.total_before_fees,
        after_fees: acc.after_fees + r.total_after_fees,
        payout: acc.payout + r.payout,
    });

    Ok(UnitOutcome {
        context: *ctx,
        processed: processed.path,
        canonical: canonical.path,
        rows: canonical.records.len(),
        checksums,
        totals,
    })
}

/// Per-unit results of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<(RunContext, Result<UnitOutcome>)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&RunContext, &TallyError)> {
        self.results
            .iter()
            .filter_map(|(ctx, r)| r.as_ref().err().map(|e| (ctx, e)))
    }

    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Run every unit. A failure is recorded against its unit and the batch
/// moves on.
pub fn run_batch(specs: &[UnitSpec], workspace: &Workspace, rates: &Rates) -> BatchReport {
    let results = specs
        .iter()
        .map(|spec| {
            let result = run_unit(spec, workspace, rates);
            if let Err(e) = &result {
                warn!(unit = %spec.context.label(), error = %e, "unit failed");
            }
            (spec.context, result)
        })
        .collect();
    BatchReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx(provider: Provider) -> RunContext {
        RunContext::new(provider, Store::Ameci, date(2023, 5, 1), date(2023, 5, 31)).unwrap()
    }

    const BRYGID_EXPORT: &str = "STORE\tORDER_ID\tDATE\tTYPE\tTOTAL_BEFORE_TAX\tDEL_CHARGE\tTIP_AMOUNT\tTOTAL_TAX\tTOTAL_AFTER_TAX\tTOTAL_DISCOUNT\tPAY_TYPE\tPAY_AMOUNT\n\
ameci\t2002\t05/03/2023 18:05\tDelivery\t43.00\t3.00\t5.00\t3.10\t51.10\t0.00\tVisa\t51.10\n\
ameci\t2001\t05/02/2023 12:00\tPickup\t10.00\t0.00\t0.00\t0.78\t10.78\t1.00\tCash\t0.00\n";

    #[test]
    fn test_file_name() {
        assert_eq!(
            ctx(Provider::Brygid).file_name(ReportType::Orders),
            "brygid_ameci_orders_05_01_2023_05_31_2023.csv"
        );
    }

    #[test]
    fn test_context_rejects_inverted_period() {
        assert!(RunContext::new(Provider::Slice, Store::Aroma, date(2023, 5, 2), date(2023, 5, 1)).is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let c = ctx(Provider::Brygid);
        assert!(c.contains(date(2023, 5, 31).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!c.contains(date(2023, 6, 1).and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn test_run_unit_writes_processed_and_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("orders.txt");
        std::fs::write(&raw, BRYGID_EXPORT).unwrap();
        let workspace = Workspace::under(dir.path());
        let spec = UnitSpec {
            context: ctx(Provider::Brygid),
            files: vec![raw],
            totals: BTreeMap::new(),
        };
        let outcome = run_unit(&spec, &workspace, &Rates::default()).unwrap();
        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.checksums.len(), 1);
        assert!(outcome.processed.ends_with("processed/brygid_ameci_orders_05_01_2023_05_31_2023.csv"));

        let written = validation::read_canonical(&outcome.canonical).unwrap();
        let processed = load_raw(&outcome.processed).unwrap();
        assert_eq!(validation::all_checks(&written, &processed), Ok(()));
        // processed rows were sorted by date
        assert_eq!(processed.row(0).text("ORDER_ID").unwrap(), "2001");

        // rerun overwrites rather than appends
        let again = run_unit(&spec, &workspace, &Rates::default()).unwrap();
        assert_eq!(again.canonical, outcome.canonical);
        assert_eq!(validation::read_canonical(&again.canonical).unwrap().len(), 2);
    }

    #[test]
    fn test_run_unit_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("orders.csv");
        std::fs::write(&raw, "a,b\n").unwrap();
        let spec = UnitSpec {
            context: ctx(Provider::Brygid),
            files: vec![raw],
            totals: BTreeMap::new(),
        };
        let err = run_unit(&spec, &Workspace::under(dir.path()), &Rates::default()).unwrap_err();
        match err {
            TallyError::Validation(v) => assert_eq!(v.check(), "file_extension"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("orders.txt");
        std::fs::write(&good, BRYGID_EXPORT).unwrap();
        let out_of_range = dir.path().join("june.txt");
        std::fs::write(&out_of_range, BRYGID_EXPORT.replace("05/03/2023", "06/03/2023")).unwrap();

        let specs = vec![
            UnitSpec {
                context: ctx(Provider::Brygid),
                files: vec![out_of_range],
                totals: BTreeMap::new(),
            },
            UnitSpec {
                context: RunContext::new(Provider::Brygid, Store::Aroma, date(2023, 5, 1), date(2023, 5, 31))
                    .unwrap(),
                files: vec![good],
                totals: BTreeMap::new(),
            },
        ];
        let report = run_batch(&specs, &Workspace::under(dir.path()), &Rates::default());
        assert!(!report.is_clean());
        assert_eq!(report.succeeded().count(), 1);
        let failures: Vec<_> = report.failed().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.store, Store::Ameci);
        assert!(matches!(
            failures[0].1,
            TallyError::Validation(validation::ValidationError::DateOutOfRange { .. })
        ));
    }
}
