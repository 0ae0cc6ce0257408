//! PDF financial report
//!
//! The report is assembled in two steps: [`ReportData`] gathers every figure
//! from an [`Analyzer`], then [`ReportGenerator`] lays it out on US-letter
//! pages with tables and simple vector charts.

use chrono::{NaiveDate, NaiveDateTime};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rect, Rgb,
};
use tracing::debug;

use crate::analyze::Analyzer;
use crate::error::{Error, Result};
use crate::models::{Anomaly, BasicStats, CategoryTotal, MonthlySummary, Projections};

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 18.0;
const ROW_HEIGHT: f32 = 6.5;
const PT_TO_MM: f32 = 0.3528;

/// Categories beyond this many are folded into "Other" on the chart
const MAX_CHART_SLICES: usize = 6;

/// Descriptions longer than this are cut in the anomalies table
const MAX_DESCRIPTION_CHARS: usize = 30;

const CHART_COLORS: [(f32, f32, f32); 6] = [
    (0.20, 0.47, 0.73),
    (0.95, 0.55, 0.18),
    (0.30, 0.69, 0.31),
    (0.84, 0.24, 0.24),
    (0.58, 0.40, 0.74),
    (0.55, 0.55, 0.55),
];

/// Format an amount with thousands separators, e.g. `Rs. 12,345.60`
///
/// The built-in PDF fonts have no rupee glyph, hence the `Rs.` prefix.
pub fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}Rs. {}.{}", sign, grouped, frac)
}

/// Shorten a description for table display
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        let cut: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        format!("{}...", cut)
    } else {
        description.to_string()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Every figure shown in the report
#[derive(Debug, Clone)]
pub struct ReportData {
    pub user_name: String,
    pub generated_at: NaiveDateTime,
    pub stats: BasicStats,
    pub categories: Vec<CategoryTotal>,
    pub monthly: Vec<MonthlySummary>,
    pub anomalies: Vec<Anomaly>,
    pub projections: Projections,
}

impl ReportData {
    pub fn collect(
        analyzer: &Analyzer<'_>,
        user_name: &str,
        generated_at: NaiveDateTime,
        today: NaiveDate,
    ) -> Self {
        Self {
            user_name: user_name.to_string(),
            generated_at,
            stats: analyzer.basic_stats(),
            categories: analyzer.category_breakdown(),
            monthly: analyzer.monthly_breakdown(),
            anomalies: analyzer.anomalies(),
            projections: analyzer.projections(today),
        }
    }

    /// Chart slices: the largest five plus "Other" when there are too many
    pub fn chart_slices(&self) -> Vec<(String, f64)> {
        let mut slices: Vec<(String, f64)> = self
            .categories
            .iter()
            .map(|c| (capitalize(c.category.as_str()), c.amount))
            .collect();

        if slices.len() > MAX_CHART_SLICES {
            let rest: f64 = slices[MAX_CHART_SLICES - 1..].iter().map(|(_, a)| a).sum();
            slices.truncate(MAX_CHART_SLICES - 1);
            slices.push(("Other".to_string(), crate::analyze::round2(rest)));
        }
        slices
    }
}

/// Tracks the current page and vertical position while writing
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Distance from the bottom of the page, in mm
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| Error::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| Error::Pdf(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    /// Start a new page if less than `height` mm remain
    fn ensure_space(&mut self, height: f32) {
        if self.y - height >= MARGIN {
            return;
        }
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
        self.pages += 1;
    }

    fn set_fill(&self, (r, g, b): (f32, f32, f32)) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    fn text_at(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    /// Write one line of text at the cursor and advance
    fn line(&mut self, text: &str, size: f32, bold: bool) {
        let height = size * PT_TO_MM * 1.6;
        self.ensure_space(height);
        self.y -= height;
        self.set_fill((0.0, 0.0, 0.0));
        self.text_at(text, size, MARGIN, self.y, bold);
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn heading(&mut self, text: &str) {
        // Keep a heading on the same page as at least a couple of rows
        self.ensure_space(14.0 + ROW_HEIGHT * 2.0);
        self.gap(4.0);
        self.line(text, 14.0, true);
        self.gap(2.0);
    }

    fn filled_rect(&self, x1: f32, y1: f32, x2: f32, y2: f32, color: (f32, f32, f32)) {
        self.set_fill(color);
        self.layer.add_rect(Rect::new(Mm(x1), Mm(y1), Mm(x2), Mm(y2)));
    }

    fn stroke_line(&self, points: &[(f32, f32)], color: (f32, f32, f32), thickness: f32) {
        let (r, g, b) = color;
        self.layer
            .set_outline_color(Color::Rgb(Rgb::new(r, g, b, None)));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: points
                .iter()
                .map(|&(x, y)| (Point::new(Mm(x), Mm(y)), false))
                .collect(),
            is_closed: false,
        });
    }

    /// Draw a table; the header row is shaded and bold
    fn table(&mut self, headers: &[&str], widths: &[f32], rows: &[Vec<String>]) {
        let total_width: f32 = widths.iter().sum();

        let draw_row = |writer: &mut Self, cells: &[String], header: bool| {
            writer.ensure_space(ROW_HEIGHT);
            let top = writer.y;
            writer.y -= ROW_HEIGHT;
            if header {
                writer.filled_rect(MARGIN, writer.y, MARGIN + total_width, top, (0.85, 0.88, 0.92));
            }
            writer.stroke_line(
                &[(MARGIN, writer.y), (MARGIN + total_width, writer.y)],
                (0.75, 0.75, 0.75),
                0.5,
            );
            writer.set_fill((0.0, 0.0, 0.0));
            let mut x = MARGIN + 1.5;
            for (cell, width) in cells.iter().zip(widths) {
                writer.text_at(cell, 9.5, x, writer.y + 2.0, header);
                x += width;
            }
        };

        let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        draw_row(self, &header_cells, true);
        for row in rows {
            draw_row(self, row, false);
        }
        self.gap(3.0);
    }

    /// Horizontal bar chart, one bar per slice
    fn bar_chart(&mut self, slices: &[(String, f64)]) {
        let bar_height = 5.0;
        let label_width = 38.0;
        let max_bar = PAGE_WIDTH - 2.0 * MARGIN - label_width - 35.0;
        let max_value = slices.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);

        self.ensure_space(slices.len() as f32 * (bar_height + 2.0) + 4.0);
        for (i, (label, value)) in slices.iter().enumerate() {
            self.y -= bar_height + 2.0;
            let width = if max_value > 0.0 {
                (*value / max_value) as f32 * max_bar
            } else {
                0.0
            };
            let x0 = MARGIN + label_width;
            self.filled_rect(
                x0,
                self.y,
                x0 + width.max(0.5),
                self.y + bar_height,
                CHART_COLORS[i % CHART_COLORS.len()],
            );
            self.set_fill((0.0, 0.0, 0.0));
            self.text_at(label, 9.0, MARGIN, self.y + 1.2, false);
            self.text_at(&format_currency(*value), 8.0, x0 + width + 2.0, self.y + 1.2, false);
        }
        self.gap(4.0);
    }

    /// Line chart of one value per labelled point
    fn line_chart(&mut self, points: &[(String, f64)]) {
        let height = 55.0;
        let left = MARGIN + 22.0;
        let right = PAGE_WIDTH - MARGIN - 5.0;

        self.ensure_space(height + 14.0);
        let top = self.y - 4.0;
        let bottom = top - height;
        let axis = (0.3, 0.3, 0.3);

        self.stroke_line(&[(left, top), (left, bottom), (right, bottom)], axis, 0.8);

        let max_value = points.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
        self.set_fill((0.0, 0.0, 0.0));
        self.text_at(&format_currency(max_value), 7.0, MARGIN, top - 1.0, false);
        self.text_at("Rs. 0.00", 7.0, MARGIN, bottom, false);

        let step = if points.len() > 1 {
            (right - left - 6.0) / (points.len() - 1) as f32
        } else {
            0.0
        };
        let coords: Vec<(f32, f32)> = points
            .iter()
            .enumerate()
            .map(|(i, (_, value))| {
                let x = left + 3.0 + step * i as f32;
                let y = if max_value > 0.0 {
                    bottom + (*value / max_value) as f32 * (height - 4.0)
                } else {
                    bottom
                };
                (x, y)
            })
            .collect();

        if coords.len() > 1 {
            self.stroke_line(&coords, CHART_COLORS[0], 1.5);
        }
        for &(x, y) in &coords {
            self.filled_rect(x - 0.9, y - 0.9, x + 0.9, y + 0.9, CHART_COLORS[0]);
        }

        // Thin out labels so they do not overlap
        let label_every = (points.len() / 8).max(1);
        self.set_fill((0.0, 0.0, 0.0));
        for (i, ((label, _), (x, _))) in points.iter().zip(&coords).enumerate() {
            if i % label_every == 0 {
                self.text_at(label, 7.0, x - 5.0, bottom - 5.0, false);
            }
        }

        self.y = bottom - 10.0;
    }

    fn finish(self) -> Result<(Vec<u8>, usize)> {
        let pages = self.pages;
        let bytes = self
            .doc
            .save_to_bytes()
            .map_err(|e| Error::Pdf(e.to_string()))?;
        Ok((bytes, pages))
    }
}

/// Renders [`ReportData`] as a PDF document
pub struct ReportGenerator {
    data: ReportData,
}

impl ReportGenerator {
    pub fn new(data: ReportData) -> Self {
        Self { data }
    }

    /// Gather data from an analyzer and prepare a generator
    pub fn from_analyzer(
        analyzer: &Analyzer<'_>,
        user_name: &str,
        generated_at: NaiveDateTime,
        today: NaiveDate,
    ) -> Self {
        Self::new(ReportData::collect(analyzer, user_name, generated_at, today))
    }

    pub fn data(&self) -> &ReportData {
        &self.data
    }

    /// Render the report to PDF bytes
    pub fn generate(&self) -> Result<Vec<u8>> {
        let data = &self.data;
        let title = format!("Financial Analysis Report for {}", data.user_name);
        let mut w = PageWriter::new(&title)?;

        w.line(&title, 18.0, true);
        w.gap(1.0);
        w.line(
            &format!(
                "Report generated on: {}",
                data.generated_at.format("%Y-%m-%d %H:%M")
            ),
            10.0,
            false,
        );

        // Summary
        w.heading("Financial Summary");
        let stats = &data.stats;
        let rows = vec![
            vec!["Total Transactions".to_string(), stats.total_transactions.to_string()],
            vec!["Total Debits".to_string(), format_currency(stats.total_debit)],
            vec!["Total Credits".to_string(), format_currency(stats.total_credit)],
            vec!["Net Cashflow".to_string(), format_currency(stats.net_cashflow)],
            vec![
                "Average Transaction".to_string(),
                format_currency(stats.average_transaction),
            ],
        ];
        w.table(&["Metric", "Value"], &[63.5, 63.5], &rows);

        // Categories
        w.heading("Spending by Category");
        if data.categories.is_empty() {
            w.line("No category data available", 10.0, false);
        } else {
            w.bar_chart(&data.chart_slices());
            let rows: Vec<Vec<String>> = data
                .categories
                .iter()
                .map(|c| vec![capitalize(c.category.as_str()), format_currency(c.amount)])
                .collect();
            w.table(&["Category", "Amount"], &[63.5, 63.5], &rows);
        }

        // Monthly trend
        w.heading("Monthly Spending Trends");
        if data.monthly.is_empty() {
            w.line("No monthly data available", 10.0, false);
        } else {
            let points: Vec<(String, f64)> = data
                .monthly
                .iter()
                .map(|m| (m.month.clone(), m.total_debit))
                .collect();
            w.line_chart(&points);
        }

        // Anomalies
        w.heading("Unusual Transactions");
        if data.anomalies.is_empty() {
            w.line("No unusual transactions detected", 10.0, false);
        } else {
            let rows: Vec<Vec<String>> = data
                .anomalies
                .iter()
                .map(|a| {
                    vec![
                        a.date.format("%Y-%m-%d").to_string(),
                        truncate_description(&a.description),
                        format_currency(a.amount),
                        capitalize(a.category.as_str()),
                    ]
                })
                .collect();
            w.table(
                &["Date", "Description", "Amount", "Category"],
                &[25.4, 76.2, 32.0, 38.1],
                &rows,
            );
        }

        // Projection
        w.heading("Monthly Spending Projection");
        match &data.projections.total {
            Some(total) if !data.projections.is_empty() => {
                let yes_no = |b: bool| (if b { "Yes" } else { "No" }).to_string();
                let mut rows: Vec<Vec<String>> = data
                    .projections
                    .categories
                    .iter()
                    .map(|c| {
                        vec![
                            capitalize(c.category.as_str()),
                            format_currency(c.projection.current_spent),
                            format_currency(c.projection.projected_amount),
                            format_currency(c.projection.previous_month),
                            yes_no(c.projection.possible_overshoot),
                        ]
                    })
                    .collect();
                rows.push(vec![
                    "TOTAL".to_string(),
                    format_currency(total.current_spent),
                    format_currency(total.projected_amount),
                    format_currency(total.previous_month),
                    yes_no(total.possible_overshoot),
                ]);
                w.table(
                    &["Category", "Current", "Projected", "Previous Month", "Overshoot"],
                    &[32.0, 34.0, 34.0, 36.0, 28.0],
                    &rows,
                );
            }
            _ => w.line("No projection data available", 10.0, false),
        }

        let (bytes, pages) = w.finish()?;
        debug!("Rendered report: {} pages, {} bytes", pages, bytes.len());
        Ok(bytes)
    }
}
