//! Spending analytics over a user's transactions
//!
//! All amounts in results are rounded to two decimals. Everything here is
//! pure: callers load transactions and pass "today" explicitly so results
//! are reproducible.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{
    Anomaly, BasicStats, Category, CategoryFlow, CategoryProjection, CategoryTotal,
    HeatmapPoint, MonthlySummary, Projection, Projections, RecurringTransaction, Transaction,
};

/// Tuning for the analyzer's detectors
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Same description and amount must be seen at least this many times
    pub recurring_min_occurrences: usize,
    /// ...with at least one pair of consecutive dates this close together
    pub recurring_window_days: i64,
    /// |z| above this is an anomaly
    pub anomaly_z_threshold: f64,
    /// Category projections above previous month times this factor overshoot
    pub category_overshoot_factor: f64,
    /// Total projection above previous month total times this factor overshoots
    pub total_overshoot_factor: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            recurring_min_occurrences: 2,
            recurring_window_days: 45,
            anomaly_z_threshold: 2.0,
            category_overshoot_factor: 1.2,
            total_overshoot_factor: 1.1,
        }
    }
}

/// Round to two decimal places
///
/// Negative zero (an empty float sum, or a tiny negative rounded away) comes
/// back as `0.0` so it never serializes as `-0.0`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

/// Analytics over a borrowed set of transactions
pub struct Analyzer<'a> {
    transactions: &'a [Transaction],
    config: AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(transactions: &'a [Transaction]) -> Self {
        Self::with_config(transactions, AnalysisConfig::default())
    }

    pub fn with_config(transactions: &'a [Transaction], config: AnalysisConfig) -> Self {
        Self {
            transactions,
            config,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions
    }

    fn debits(&self) -> impl Iterator<Item = &'a Transaction> + '_ {
        self.transactions.iter().filter(|t| t.is_debit())
    }

    /// Totals, net cashflow and mean transaction size
    pub fn basic_stats(&self) -> BasicStats {
        if self.transactions.is_empty() {
            return BasicStats::default();
        }

        let total_debit: f64 = self.debits().map(|t| t.amount).sum();
        let total_credit: f64 = self
            .transactions
            .iter()
            .filter(|t| !t.is_debit())
            .map(|t| t.amount)
            .sum();
        let total_amount: f64 = self.transactions.iter().map(|t| t.amount).sum();

        BasicStats {
            total_transactions: self.transactions.len() as i64,
            total_debit: round2(total_debit),
            total_credit: round2(total_credit),
            net_cashflow: round2(total_credit - total_debit),
            average_transaction: round2(total_amount / self.transactions.len() as f64),
        }
    }

    /// Debit totals per category, largest first
    pub fn category_breakdown(&self) -> Vec<CategoryTotal> {
        let mut totals: HashMap<Category, f64> = HashMap::new();
        for tx in self.debits() {
            *totals.entry(tx.category).or_insert(0.0) += tx.amount;
        }

        let mut result: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(category, amount)| CategoryTotal {
                category,
                amount: round2(amount),
            })
            .collect();
        result.sort_by(|a, b| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        });
        result
    }

    /// Per-month debit/credit totals with a per-category split
    pub fn monthly_breakdown(&self) -> Vec<MonthlySummary> {
        let mut months: BTreeMap<String, BTreeMap<Category, CategoryFlow>> = BTreeMap::new();

        for tx in self.transactions {
            let flow = months
                .entry(month_key(tx.date))
                .or_default()
                .entry(tx.category)
                .or_default();
            if tx.is_debit() {
                flow.debit += tx.amount;
            } else {
                flow.credit += tx.amount;
            }
        }

        months
            .into_iter()
            .map(|(month, categories)| {
                let total_debit: f64 = categories.values().map(|f| f.debit).sum();
                let total_credit: f64 = categories.values().map(|f| f.credit).sum();
                MonthlySummary {
                    month,
                    total_debit: round2(total_debit),
                    total_credit: round2(total_credit),
                    categories: categories
                        .into_iter()
                        .map(|(category, flow)| {
                            (
                                category,
                                CategoryFlow {
                                    debit: round2(flow.debit),
                                    credit: round2(flow.credit),
                                },
                            )
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// Debit total per calendar day, oldest first
    pub fn daily_heatmap(&self) -> Vec<HeatmapPoint> {
        let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for tx in self.debits() {
            *days.entry(tx.date).or_insert(0.0) += tx.amount;
        }

        days.into_iter()
            .map(|(date, amount)| HeatmapPoint {
                date,
                amount: round2(amount),
            })
            .collect()
    }

    /// IDs of transactions that repeat with the same description and amount
    ///
    /// A group counts when it has enough members and at least one pair of
    /// consecutive dates falls within the window. Every member is flagged.
    pub fn recurring_ids(&self) -> HashSet<i64> {
        let mut groups: HashMap<(&str, u64), Vec<&Transaction>> = HashMap::new();
        for tx in self.transactions {
            groups
                .entry((tx.description.as_str(), tx.amount.to_bits()))
                .or_default()
                .push(tx);
        }

        let mut ids = HashSet::new();
        for mut group in groups.into_values() {
            if group.len() < self.config.recurring_min_occurrences {
                continue;
            }
            group.sort_by_key(|t| t.date);
            let close_pair = group
                .windows(2)
                .any(|w| (w[1].date - w[0].date).num_days() <= self.config.recurring_window_days);
            if close_pair {
                ids.extend(group.iter().map(|t| t.id));
            }
        }
        ids
    }

    /// Recurring transactions, oldest first
    pub fn recurring(&self) -> Vec<RecurringTransaction> {
        let ids = self.recurring_ids();
        let mut result: Vec<RecurringTransaction> = self
            .transactions
            .iter()
            .filter(|t| ids.contains(&t.id))
            .map(|t| RecurringTransaction {
                id: t.id,
                date: t.date,
                description: t.description.clone(),
                amount: round2(t.amount),
                category: t.category,
            })
            .collect();
        result.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        result
    }

    /// Transactions far from their category's mean amount
    ///
    /// Uses the sample standard deviation. Categories with a single
    /// transaction or no spread are skipped.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let mut by_category: HashMap<Category, Vec<&Transaction>> = HashMap::new();
        for tx in self.transactions {
            by_category.entry(tx.category).or_default().push(tx);
        }

        let mut anomalies = Vec::new();
        for (category, txs) in by_category {
            if txs.len() <= 1 {
                continue;
            }

            let n = txs.len() as f64;
            let mean = txs.iter().map(|t| t.amount).sum::<f64>() / n;
            let variance = txs.iter().map(|t| (t.amount - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let std_dev = variance.sqrt();
            if std_dev == 0.0 {
                continue;
            }

            for tx in txs {
                let z_score = (tx.amount - mean) / std_dev;
                if z_score.abs() > self.config.anomaly_z_threshold {
                    anomalies.push(Anomaly {
                        id: tx.id,
                        date: tx.date,
                        description: tx.description.clone(),
                        amount: round2(tx.amount),
                        category,
                        z_score: round2(z_score),
                    });
                }
            }
        }

        anomalies.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        anomalies
    }

    /// Project this month's debits to month end and compare with last month
    ///
    /// "Last month" is the month containing `today - 30 days`. Returns an
    /// empty result when there are no debits in `today`'s month.
    pub fn projections(&self, today: NaiveDate) -> Projections {
        let current_month = month_key(today);
        let previous_month = month_key(today - Duration::days(30));

        let days_total = days_in_month(today) as f64;
        let days_elapsed = today.day() as f64;
        let days_remaining = days_total - days_elapsed;

        let mut current: BTreeMap<&str, (Category, f64)> = BTreeMap::new();
        let mut previous: HashMap<Category, f64> = HashMap::new();
        for tx in self.debits() {
            let month = month_key(tx.date);
            if month == current_month {
                current
                    .entry(tx.category.as_str())
                    .or_insert((tx.category, 0.0))
                    .1 += tx.amount;
            }
            // On the 31st (and late March) both keys name the same month
            if month == previous_month {
                *previous.entry(tx.category).or_insert(0.0) += tx.amount;
            }
        }

        if current.is_empty() {
            return Projections::default();
        }

        let categories: Vec<CategoryProjection> = current
            .values()
            .map(|&(category, spent)| {
                let daily_avg = spent / days_elapsed;
                let projected = spent + daily_avg * days_remaining;
                let prev = previous.get(&category).copied().unwrap_or(0.0);
                CategoryProjection {
                    category,
                    projection: Projection {
                        current_spent: round2(spent),
                        projected_amount: round2(projected),
                        previous_month: round2(prev),
                        possible_overshoot: prev > 0.0
                            && projected > prev * self.config.category_overshoot_factor,
                    },
                }
            })
            .collect();

        let total_spent: f64 = current.values().map(|(_, spent)| spent).sum();
        let total_projected = total_spent / days_elapsed * days_total;
        let prev_total: f64 = previous.values().sum();

        Projections {
            month: Some(current_month),
            categories,
            total: Some(Projection {
                current_spent: round2(total_spent),
                projected_amount: round2(total_projected),
                previous_month: round2(prev_total),
                possible_overshoot: prev_total > 0.0
                    && total_projected > prev_total * self.config.total_overshoot_factor,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bank, CategorySource, TransactionType};
    use chrono::Utc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(
        id: i64,
        date: NaiveDate,
        description: &str,
        amount: f64,
        transaction_type: TransactionType,
        category: Category,
    ) -> Transaction {
        Transaction {
            id,
            user_id: 1,
            date,
            description: description.to_string(),
            amount,
            transaction_type,
            category,
            category_source: CategorySource::Keyword,
            is_recurring: false,
            bank: Bank::Sbi,
            import_hash: format!("hash-{}", id),
            import_session_id: None,
            created_at: Utc::now(),
        }
    }

    fn debit(id: i64, date: NaiveDate, description: &str, amount: f64, category: Category) -> Transaction {
        tx(id, date, description, amount, TransactionType::Debit, category)
    }

    fn credit(id: i64, date: NaiveDate, description: &str, amount: f64, category: Category) -> Transaction {
        tx(id, date, description, amount, TransactionType::Credit, category)
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(ymd(2024, 2, 10)), 29);
        assert_eq!(days_in_month(ymd(2023, 2, 1)), 28);
        assert_eq!(days_in_month(ymd(2023, 12, 31)), 31);
        assert_eq!(days_in_month(ymd(2023, 4, 15)), 30);
    }

    #[test]
    fn test_empty_inputs() {
        let analyzer = Analyzer::new(&[]);
        assert_eq!(analyzer.basic_stats(), BasicStats::default());
        assert!(analyzer.category_breakdown().is_empty());
        assert!(analyzer.monthly_breakdown().is_empty());
        assert!(analyzer.daily_heatmap().is_empty());
        assert!(analyzer.recurring().is_empty());
        assert!(analyzer.anomalies().is_empty());
        assert!(analyzer.projections(ymd(2023, 4, 15)).is_empty());
    }

    #[test]
    fn test_basic_stats() {
        let txs = vec![
            credit(1, ymd(2023, 4, 1), "SALARY", 50000.0, Category::Income),
            debit(2, ymd(2023, 4, 5), "ELECTRICITY BILL", 2500.0, Category::Utilities),
            debit(3, ymd(2023, 4, 6), "SWIGGY", 333.333, Category::Food),
        ];
        let stats = Analyzer::new(&txs).basic_stats();
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.total_debit, 2833.33);
        assert_eq!(stats.total_credit, 50000.0);
        assert_eq!(stats.net_cashflow, 47166.67);
        assert_eq!(stats.average_transaction, 17611.11);
    }

    #[test]
    fn test_category_breakdown_debits_only_sorted() {
        let txs = vec![
            debit(1, ymd(2023, 4, 1), "SWIGGY", 200.0, Category::Food),
            debit(2, ymd(2023, 4, 2), "ZOMATO", 300.0, Category::Food),
            debit(3, ymd(2023, 4, 3), "AMAZON", 1000.0, Category::Shopping),
            credit(4, ymd(2023, 4, 4), "REFUND FOOD", 5000.0, Category::Food),
        ];
        let breakdown = Analyzer::new(&txs).category_breakdown();
        assert_eq!(
            breakdown,
            vec![
                CategoryTotal { category: Category::Shopping, amount: 1000.0 },
                CategoryTotal { category: Category::Food, amount: 500.0 },
            ]
        );
    }

    #[test]
    fn test_monthly_breakdown() {
        let txs = vec![
            debit(1, ymd(2023, 5, 2), "SWIGGY", 200.0, Category::Food),
            credit(2, ymd(2023, 4, 1), "SALARY", 50000.0, Category::Income),
            debit(3, ymd(2023, 4, 5), "BILL", 2500.0, Category::Utilities),
            debit(4, ymd(2023, 4, 9), "BILL", 100.0, Category::Utilities),
        ];
        let months = Analyzer::new(&txs).monthly_breakdown();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2023-04");
        assert_eq!(months[0].total_debit, 2600.0);
        assert_eq!(months[0].total_credit, 50000.0);
        assert_eq!(months[0].categories[&Category::Utilities].debit, 2600.0);
        assert_eq!(months[0].categories[&Category::Income].credit, 50000.0);
        assert!(!months[0].categories.contains_key(&Category::Food));
        assert_eq!(months[1].month, "2023-05");
        assert_eq!(months[1].total_debit, 200.0);
    }

    #[test]
    fn test_daily_heatmap() {
        let txs = vec![
            debit(1, ymd(2023, 4, 2), "A", 10.0, Category::Food),
            debit(2, ymd(2023, 4, 1), "B", 5.5, Category::Food),
            debit(3, ymd(2023, 4, 2), "C", 2.25, Category::Food),
            credit(4, ymd(2023, 4, 3), "D", 100.0, Category::Income),
        ];
        let heatmap = Analyzer::new(&txs).daily_heatmap();
        assert_eq!(
            heatmap,
            vec![
                HeatmapPoint { date: ymd(2023, 4, 1), amount: 5.5 },
                HeatmapPoint { date: ymd(2023, 4, 2), amount: 12.25 },
            ]
        );
    }

    #[test]
    fn test_recurring() {
        let txs = vec![
            debit(1, ymd(2023, 1, 5), "NETFLIX", 649.0, Category::Entertainment),
            debit(2, ymd(2023, 2, 5), "NETFLIX", 649.0, Category::Entertainment),
            debit(3, ymd(2023, 3, 5), "NETFLIX", 649.0, Category::Entertainment),
            // Same description, different amount: separate group of one
            debit(4, ymd(2023, 4, 5), "NETFLIX", 799.0, Category::Entertainment),
            // Repeats but too far apart
            debit(5, ymd(2023, 1, 1), "INSURANCE", 12000.0, Category::Bills),
            debit(6, ymd(2023, 7, 1), "INSURANCE", 12000.0, Category::Bills),
        ];
        let analyzer = Analyzer::new(&txs);
        let ids: Vec<i64> = analyzer.recurring().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_recurring_window_boundary() {
        let txs = vec![
            debit(1, ymd(2023, 1, 1), "GYM", 1500.0, Category::Health),
            debit(2, ymd(2023, 2, 15), "GYM", 1500.0, Category::Health),
        ];
        // Exactly 45 days apart counts
        assert_eq!(Analyzer::new(&txs).recurring_ids().len(), 2);

        let txs = vec![
            debit(1, ymd(2023, 1, 1), "GYM", 1500.0, Category::Health),
            debit(2, ymd(2023, 2, 16), "GYM", 1500.0, Category::Health),
        ];
        assert!(Analyzer::new(&txs).recurring_ids().is_empty());
    }

    #[test]
    fn test_anomalies() {
        let mut txs: Vec<Transaction> = (1..=9)
            .map(|i| debit(i, ymd(2023, 4, i as u32), "SWIGGY", 200.0, Category::Food))
            .collect();
        txs.push(debit(10, ymd(2023, 4, 20), "FANCY RESTAURANT", 5000.0, Category::Food));
        // Single-member category is skipped
        txs.push(debit(11, ymd(2023, 4, 21), "AMAZON", 99999.0, Category::Shopping));
        // Zero spread is skipped
        txs.push(debit(12, ymd(2023, 4, 22), "METRO", 40.0, Category::Transportation));
        txs.push(debit(13, ymd(2023, 4, 23), "METRO", 40.0, Category::Transportation));

        let anomalies = Analyzer::new(&txs).anomalies();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].id, 10);
        assert_eq!(anomalies[0].category, Category::Food);
        // mean 680, sample std 1517.89..., z = 2.85
        assert_eq!(anomalies[0].z_score, 2.85);
    }

    #[test]
    fn test_projections() {
        let today = ymd(2023, 4, 10);
        let txs = vec![
            // Current month: food 1000 over 10 days, shopping 300
            debit(1, ymd(2023, 4, 2), "SWIGGY", 600.0, Category::Food),
            debit(2, ymd(2023, 4, 8), "ZOMATO", 400.0, Category::Food),
            debit(3, ymd(2023, 4, 9), "AMAZON", 300.0, Category::Shopping),
            credit(4, ymd(2023, 4, 1), "SALARY", 50000.0, Category::Income),
            // Previous month (2023-03)
            debit(5, ymd(2023, 3, 15), "SWIGGY", 2000.0, Category::Food),
            debit(6, ymd(2023, 3, 20), "AMAZON", 1000.0, Category::Shopping),
        ];

        let projections = Analyzer::new(&txs).projections(today);
        assert_eq!(projections.month.as_deref(), Some("2023-04"));
        assert_eq!(projections.categories.len(), 2);

        let food = &projections.categories[0];
        assert_eq!(food.category, Category::Food);
        assert_eq!(food.projection.current_spent, 1000.0);
        // 1000 + 100/day * 20 remaining
        assert_eq!(food.projection.projected_amount, 3000.0);
        assert_eq!(food.projection.previous_month, 2000.0);
        // 3000 > 2400
        assert!(food.projection.possible_overshoot);

        let shopping = &projections.categories[1];
        assert_eq!(shopping.category, Category::Shopping);
        assert_eq!(shopping.projection.projected_amount, 900.0);
        assert!(!shopping.projection.possible_overshoot);

        let total = projections.total.unwrap();
        assert_eq!(total.current_spent, 1300.0);
        assert_eq!(total.projected_amount, 3900.0);
        assert_eq!(total.previous_month, 3000.0);
        // 3900 > 3300
        assert!(total.possible_overshoot);
    }

    #[test]
    fn test_projections_without_previous_month() {
        let today = ymd(2023, 4, 10);
        let txs = vec![debit(1, ymd(2023, 4, 2), "SWIGGY", 600.0, Category::Food)];
        let projections = Analyzer::new(&txs).projections(today);
        let food = &projections.categories[0];
        assert_eq!(food.projection.previous_month, 0.0);
        assert!(!food.projection.possible_overshoot);
        assert!(!projections.total.unwrap().possible_overshoot);
    }

    #[test]
    fn test_projections_on_the_31st_compare_against_same_month() {
        // 2023-05-31 minus 30 days is 2023-05-01
        let today = ymd(2023, 5, 31);
        let txs = vec![
            debit(1, ymd(2023, 5, 3), "SWIGGY", 300.0, Category::Food),
            debit(2, ymd(2023, 5, 20), "ZOMATO", 200.0, Category::Food),
            debit(3, ymd(2023, 4, 20), "ZOMATO", 900.0, Category::Food),
        ];

        let projections = Analyzer::new(&txs).projections(today);
        let food = &projections.categories[0];
        assert_eq!(food.projection.current_spent, 500.0);
        assert_eq!(food.projection.projected_amount, 500.0);
        assert_eq!(food.projection.previous_month, 500.0);
        assert!(!food.projection.possible_overshoot);

        let total = projections.total.unwrap();
        assert_eq!(total.previous_month, 500.0);
    }

    #[test]
    fn test_projections_late_march() {
        // 2023-03-31 minus 30 days is 2023-03-01
        let txs = vec![debit(1, ymd(2023, 3, 10), "UBER", 120.0, Category::Transportation)];
        let projections = Analyzer::new(&txs).projections(ymd(2023, 3, 31));
        assert_eq!(projections.categories[0].projection.previous_month, 120.0);
    }

    #[test]
    fn test_round2_has_no_negative_zero() {
        let empty: f64 = Vec::<f64>::new().into_iter().sum();
        assert!(round2(empty).is_sign_positive());
        assert!(round2(-0.001).is_sign_positive());
        assert_eq!(round2(-1.234), -1.23);
    }

    #[test]
    fn test_totals_never_serialize_negative_zero() {
        let txs = vec![
            credit(1, ymd(2023, 4, 1), "SALARY", 50000.0, Category::Income),
        ];
        let analyzer = Analyzer::new(&txs);
        let stats = serde_json::to_string(&analyzer.basic_stats()).unwrap();
        assert!(!stats.contains("-0.0"), "{}", stats);
        assert!(stats.contains("\"total_debit\":0.0"), "{}", stats);

        let txs = vec![debit(1, ymd(2023, 4, 2), "SWIGGY", 600.0, Category::Food)];
        let projections =
            serde_json::to_string(&Analyzer::new(&txs).projections(ymd(2023, 4, 10))).unwrap();
        assert!(!projections.contains("-0.0"), "{}", projections);

        let monthly = serde_json::to_string(&analyzer.monthly_breakdown()).unwrap();
        assert!(!monthly.contains("-0.0"), "{}", monthly);
    }

    #[test]
    fn test_projections_no_current_debits() {
        let txs = vec![debit(1, ymd(2023, 3, 2), "SWIGGY", 600.0, Category::Food)];
        assert!(Analyzer::new(&txs).projections(ymd(2023, 4, 10)).is_empty());
    }
}
