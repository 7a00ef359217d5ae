// ABOUTME: The Sweeper: runs targets sequentially, accumulates records,
// ABOUTME: partitions them, and hands rendered exports to a sink.

//! Pipeline orchestration.
//!
//! Key behaviors:
//! - targets run strictly one after another with a pacing delay between them
//! - a failed target never aborts the run; its outcome is recorded and the
//!   sweep moves on
//! - cancellation skips all remaining targets and returns what was gathered
//! - exports are written even for partial or empty runs

use chrono::Local;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accessor::PageAccessor;
use crate::error::SweepError;
use crate::export::{render_table, ExportPlan, Partition};
use crate::locator::profile::TableProfile;
use crate::options::{Options, SweeperBuilder};
use crate::record::{Record, Target};
use crate::report::{RunReport, TargetOutcome};
use crate::runner::run_target;
use crate::sink::ExportSink;

/// Sweeps an ordered list of targets through one page accessor.
///
/// Construct with [`Sweeper::builder`]. The sweeper owns the accessor for the
/// whole run; only the currently-running target touches the page.
pub struct Sweeper {
    opts: Options,
    profile: TableProfile,
    accessor: Box<dyn PageAccessor>,
}

impl Sweeper {
    pub(crate) fn new(
        opts: Options,
        profile: TableProfile,
        accessor: Box<dyn PageAccessor>,
    ) -> Self {
        Self {
            opts,
            profile,
            accessor,
        }
    }

    pub fn builder() -> SweeperBuilder {
        SweeperBuilder::new()
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn profile(&self) -> &TableProfile {
        &self.profile
    }

    /// Runs every target in order and returns the aggregate report. Records
    /// accumulate in target order; failures are isolated per target.
    pub async fn run(&mut self, targets: &[Target], cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::default();
        info!(
            "sweeping {} target(s) with profile {}",
            targets.len(),
            self.profile.name
        );

        for (index, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                report.outcomes.push(TargetOutcome::cancelled(target.clone()));
                continue;
            }
            if index > 0 && !self.opts.target_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.outcomes.push(TargetOutcome::cancelled(target.clone()));
                        continue;
                    }
                    _ = sleep(self.opts.target_delay) => {}
                }
            }

            debug!(
                "target {}/{}: {} [{}]",
                index + 1,
                targets.len(),
                target.url,
                target.category
            );
            let (outcome, records) = run_target(
                self.accessor.as_mut(),
                &self.profile,
                &self.opts,
                target,
                cancel,
            )
            .await;
            if !outcome.is_success() {
                warn!("target {} ended {}: {}", target.url, outcome.kind, outcome.detail);
            }
            report.skipped_rows += outcome.skipped_rows;
            report.records.extend(records);
            report.outcomes.push(outcome);
        }

        info!(
            "sweep finished: {}/{} targets scraped, {} records, {} rows skipped",
            report.scraped_targets(),
            report.outcomes.len(),
            report.records.len(),
            report.skipped_rows
        );
        report
    }

    /// Runs the sweep, then renders and saves one export per partition bucket.
    ///
    /// Every bucket is attempted even after a save fails; the first error, if
    /// any, is returned after the rest completed. An empty or partial run
    /// still produces its (possibly header-only) exports.
    pub async fn run_to_sink(
        &mut self,
        targets: &[Target],
        plan: &ExportPlan,
        sink: &mut dyn ExportSink,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SweepError> {
        let report = self.run(targets, cancel).await;

        let now = Local::now();
        let date = plan.stamp.resolve(now.date_naive());
        let mut first_err: Option<SweepError> = None;

        for (bucket, records) in partition_records(&report.records, &plan.partitions) {
            let rendered = match render_table(&records, &plan.columns, plan.format, date) {
                Ok(text) => text,
                Err(err) => {
                    warn!("render failed for bucket {:?}: {}", bucket, err);
                    first_err.get_or_insert(err);
                    continue;
                }
            };
            let filename = plan.filename_for(bucket.as_deref(), now);
            match sink.save(&filename, &rendered) {
                Ok(()) => info!("exported {} record(s) to {}", records.len(), filename),
                Err(err) => {
                    warn!("save failed for {}: {}", filename, err);
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

/// Groups records into named buckets, one per partition, preserving record
/// order within each bucket. No partitions means one unnamed bucket with
/// everything. A record may land in several buckets, or in none.
pub fn partition_records(
    records: &[Record],
    partitions: &[Partition],
) -> Vec<(Option<String>, Vec<Record>)> {
    if partitions.is_empty() {
        return vec![(None, records.to_vec())];
    }
    partitions
        .iter()
        .map(|partition| {
            let matched = records
                .iter()
                .filter(|r| partition.rule.matches(r))
                .cloned()
                .collect();
            (Some(partition.name.clone()), matched)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::StaticAccessor;
    use crate::export::{Column, ExportFormat, PartitionRule};
    use crate::record::CellValue;
    use crate::report::OutcomeKind;
    use crate::sink::MemorySink;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn page(rows: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (symbol, price) in rows {
            body.push_str(&format!("<tr><td>{symbol}</td><td>{price}</td></tr>"));
        }
        format!(
            "<table><thead><tr><th>Symbol</th><th>Price</th></tr></thead>\
             <tbody>{body}</tbody></table>"
        )
    }

    fn test_profile() -> TableProfile {
        serde_json::from_str(
            r#"{
                "name": "test",
                "strategies": [{ "type": "header_text" }, { "type": "largest_table" }],
                "min_rows": 1
            }"#,
        )
        .unwrap()
    }

    fn sweeper(accessor: StaticAccessor) -> Sweeper {
        Sweeper::builder()
            .profile(test_profile())
            .accessor(Box::new(accessor))
            .max_retries(1)
            .attempt_timeout(Duration::from_millis(200))
            .poll_interval(Duration::from_millis(10))
            .retry_backoff(Duration::from_millis(5))
            .target_delay(Duration::ZERO)
            .build()
    }

    fn rec(symbol: &str, category: &str, cap: CellValue) -> Record {
        Record {
            symbol: symbol.to_string(),
            category: category.to_string(),
            name: None,
            price: CellValue::Number(1.0),
            market_cap: cap,
            volume: CellValue::Unavailable,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failure_keeps_other_targets() {
        let accessor = StaticAccessor::new()
            .with_page("https://b.example/ok", page(&[("SPY", "512.33"), ("QQQ", "441.07")]));
        let mut sweeper = sweeper(accessor);
        let targets = [
            Target::new("https://a.example/missing", "ETF"),
            Target::new("https://b.example/ok", "ETF"),
        ];

        let report = sweeper.run(&targets, &CancellationToken::new()).await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].kind, OutcomeKind::PageError);
        assert_eq!(report.outcomes[1].kind, OutcomeKind::Scraped);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].symbol, "SPY");
        assert_eq!(report.scraped_targets(), 1);
        assert_eq!(report.failed_targets(), 1);
        assert!(!report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn records_accumulate_in_target_order() {
        let accessor = StaticAccessor::new()
            .with_page("https://one.example/", page(&[("AAA", "1"), ("BBB", "2")]))
            .with_page("https://two.example/", page(&[("CCC", "3")]));
        let mut sweeper = sweeper(accessor);
        let targets = [
            Target::new("https://one.example/", "First"),
            Target::new("https://two.example/", "Second"),
        ];

        let report = sweeper.run(&targets, &CancellationToken::new()).await;

        let symbols: Vec<&str> = report.records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["AAA", "BBB", "CCC"]);
        assert_eq!(report.records[0].category, "First");
        assert_eq!(report.records[2].category, "Second");
        assert!(report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_run_marks_every_target() {
        let accessor =
            StaticAccessor::new().with_page("https://one.example/", page(&[("AAA", "1")]));
        let mut sweeper = sweeper(accessor);
        let targets = [
            Target::new("https://one.example/", "ETF"),
            Target::new("https://two.example/", "ETF"),
        ];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = sweeper.run(&targets, &cancel).await;

        assert!(report.records.is_empty());
        assert_eq!(report.outcomes.len(), 2);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.kind == OutcomeKind::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_target_delay_skips_the_rest() {
        let accessor = StaticAccessor::new()
            .with_page("https://one.example/", page(&[("AAA", "1")]))
            .with_page("https://two.example/", page(&[("BBB", "2")]));
        let mut sweeper = Sweeper::builder()
            .profile(test_profile())
            .accessor(Box::new(accessor))
            .max_retries(1)
            .attempt_timeout(Duration::from_millis(200))
            .poll_interval(Duration::from_millis(10))
            .target_delay(Duration::from_secs(3600))
            .build();
        let targets = [
            Target::new("https://one.example/", "ETF"),
            Target::new("https://two.example/", "ETF"),
        ];
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let report = sweeper.run(&targets, &cancel).await;

        assert_eq!(report.outcomes[0].kind, OutcomeKind::Scraped);
        assert_eq!(report.outcomes[1].kind, OutcomeKind::Cancelled);
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn no_partitions_means_one_bucket_with_everything() {
        let records = vec![rec("A", "Tech", CellValue::Unavailable)];
        let buckets = partition_records(&records, &[]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].0, None);
        assert_eq!(buckets[0].1.len(), 1);
    }

    #[test]
    fn partitions_bucket_by_rule_keeping_order() {
        let records = vec![
            rec("A", "Tech", CellValue::Number(5e11)),
            rec("B", "ETF", CellValue::Number(2e12)),
            rec("C", "Tech", CellValue::Unavailable),
        ];
        let partitions = vec![
            Partition {
                name: "tech".to_string(),
                rule: PartitionRule::Category {
                    equals: "Tech".to_string(),
                },
            },
            Partition {
                name: "trillion".to_string(),
                rule: PartitionRule::MinMarketCap { floor: 1e12 },
            },
            Partition {
                name: "all".to_string(),
                rule: PartitionRule::All,
            },
        ];

        let buckets = partition_records(&records, &partitions);

        assert_eq!(buckets.len(), 3);
        let names =
            |i: usize| buckets[i].1.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>();
        assert_eq!(buckets[0].0.as_deref(), Some("tech"));
        assert_eq!(names(0), ["A", "C"]);
        assert_eq!(names(1), ["B"]);
        assert_eq!(names(2), ["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_to_sink_writes_each_bucket() {
        let accessor = StaticAccessor::new()
            .with_page("https://one.example/", page(&[("AAA", "1.5"), ("BBB", "2.5")]));
        let mut sweeper = sweeper(accessor);
        let targets = [Target::new("https://one.example/", "ETF")];
        let plan = ExportPlan {
            columns: vec![Column::Symbol, Column::Price],
            format: ExportFormat::Csv,
            prefix: "grid".to_string(),
            partitions: vec![
                Partition {
                    name: "all".to_string(),
                    rule: PartitionRule::All,
                },
                Partition {
                    name: "none".to_string(),
                    rule: PartitionRule::Category {
                        equals: "Bonds".to_string(),
                    },
                },
            ],
            ..Default::default()
        };
        let mut sink = MemorySink::new();

        let report = sweeper
            .run_to_sink(&targets, &plan, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(sink.saved.len(), 2);
        assert!(sink.saved[0].0.starts_with("grid_all_"));
        assert!(sink.saved[0].0.ends_with(".csv"));
        assert_eq!(sink.saved[0].1, "symbol,price\nAAA,1.5\nBBB,2.5\n");
        assert!(sink.saved[1].0.starts_with("grid_none_"));
        assert_eq!(sink.saved[1].1, "symbol,price\n");
    }

    #[tokio::test(start_paused = true)]
    async fn run_to_sink_exports_header_only_when_everything_fails() {
        let mut sweeper = sweeper(StaticAccessor::new());
        let targets = [Target::new("https://missing.example/", "ETF")];
        let plan = ExportPlan {
            columns: vec![Column::Symbol, Column::Price],
            ..Default::default()
        };
        let mut sink = MemorySink::new();

        let report = sweeper
            .run_to_sink(&targets, &plan, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed_targets(), 1);
        assert_eq!(sink.saved.len(), 1);
        assert_eq!(sink.saved[0].1, "symbol,price\n");
    }
}
