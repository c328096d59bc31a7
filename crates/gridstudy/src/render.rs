//! Plain-text rendering of pivot tables

use gridstudy_core::pivot::{FieldBlock, FieldLayout, PivotTable};

const MISSING: &str = "NA";
const BLOCK_GAP: &str = " | ";
/// Upper bound on `width_scale`; wider cells only add padding
const MAX_WIDTH_SCALE: f64 = 10.0;

fn width(text: &str) -> usize {
    text.chars().count()
}

fn format_value(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) => format!("{v:.digits$}"),
        None => MISSING.to_string(),
    }
}

/// Render a table with one header line per column level and one line per row key.
pub fn render_table(table: &PivotTable) -> String {
    let mut lines = Vec::new();

    if !table.fixed.is_empty() {
        let fixed: Vec<String> = table
            .fixed
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        lines.push(format!("fixed: {}", fixed.join(", ")));
    }

    match table.layout {
        FieldLayout::Stacked => {
            let blocks: Vec<&FieldBlock> = table.blocks.iter().collect();
            render_blocks(&mut lines, table, &blocks, true);
        }
        FieldLayout::Separate => {
            for (i, block) in table.blocks.iter().enumerate() {
                if i > 0 {
                    lines.push(String::new());
                }
                lines.push(format!("[{}]", block.field));
                render_blocks(&mut lines, table, &[block], false);
            }
        }
    }

    if let Some(notes) = &table.notes {
        lines.push(String::new());
        let source = if notes.raw_source {
            "reduced from raw repetitions"
        } else {
            "repetition means"
        };
        lines.push(format!(
            "repetitions: {}, trials: {}, failures: {} ({source})",
            notes.repetitions, notes.total_trials, notes.failure_count
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_blocks(
    lines: &mut Vec<String>,
    table: &PivotTable,
    blocks: &[&FieldBlock],
    field_header: bool,
) {
    let rows = &table.rows;
    let cols = &table.cols;
    let n_cols = cols.len();

    // Row label column widths, outermost level first
    let label_widths: Vec<usize> = rows
        .levels()
        .iter()
        .map(|level| {
            level
                .values
                .iter()
                .map(|v| width(&v.to_string()))
                .chain([width(&level.param)])
                .max()
                .unwrap_or(0)
        })
        .collect();
    let label_area = label_widths.iter().sum::<usize>() + label_widths.len().saturating_sub(1);

    let formatted: Vec<Vec<String>> = blocks
        .iter()
        .map(|b| b.cells.iter().map(|&c| format_value(c, table.digits)).collect())
        .collect();

    // Every column is as wide as the widest value or leaf label, scaled up
    let leaf_labels = cols.nodes_at_depth(cols.depth().saturating_sub(1));
    let widest = formatted
        .iter()
        .flatten()
        .map(|v| width(v))
        .chain(
            leaf_labels
                .iter()
                .map(|n| width(&format!("{}={}", n.param, n.value))),
        )
        .max()
        .unwrap_or(MISSING.len());
    let scale = table.width_scale.max(1.0).min(MAX_WIDTH_SCALE);
    let cell_width = (widest.max(MISSING.len()) as f64 * scale).ceil() as usize;
    let block_width = n_cols * cell_width + n_cols.saturating_sub(1);
    let block_widths: Vec<usize> = blocks
        .iter()
        .map(|b| {
            if field_header {
                block_width.max(width(&b.field))
            } else {
                block_width
            }
        })
        .collect();

    let row_names = || -> String {
        rows.levels()
            .iter()
            .zip(&label_widths)
            .map(|(level, &w)| format!("{:<w$}", level.param))
            .collect::<Vec<_>>()
            .join(" ")
    };

    if field_header {
        let header: Vec<String> = blocks
            .iter()
            .zip(&block_widths)
            .map(|(b, &w)| format!("{:^w$}", b.field))
            .collect();
        let prefix = if cols.depth() == 0 {
            row_names()
        } else {
            " ".repeat(label_area)
        };
        lines.push(format!("{:<label_area$}  {}", prefix, header.join(BLOCK_GAP)));
    }

    for depth in 0..cols.depth() {
        let spans: Vec<String> = cols
            .nodes_at_depth(depth)
            .iter()
            .map(|node| {
                let w = node.span * cell_width + node.span - 1;
                format!("{:>w$}", format!("{}={}", node.param, node.value))
            })
            .collect();
        let block_header = spans.join(" ");
        let header: Vec<String> = block_widths
            .iter()
            .map(|&w| format!("{block_header:>w$}"))
            .collect();
        let prefix = if depth + 1 == cols.depth() {
            row_names()
        } else {
            String::new()
        };
        lines.push(format!("{:<label_area$}  {}", prefix, header.join(BLOCK_GAP)));
    }

    if !field_header && cols.depth() == 0 && rows.depth() > 0 {
        lines.push(row_names());
    }

    for row in 0..rows.len() {
        let labels: Vec<String> = rows
            .labels(row)
            .iter()
            .zip(&label_widths)
            .map(|((_, value), &w)| format!("{:<w$}", value.to_string()))
            .collect();
        let cells: Vec<String> = formatted
            .iter()
            .zip(&block_widths)
            .map(|(block, &w)| {
                let values: Vec<String> = block[row * n_cols..(row + 1) * n_cols]
                    .iter()
                    .map(|v| format!("{v:>cell_width$}"))
                    .collect();
                format!("{:>w$}", values.join(" "))
            })
            .collect();
        lines.push(format!(
            "{:<label_area$}  {}",
            labels.join(" "),
            cells.join(BLOCK_GAP)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstudy_core::{
        ParameterGrid, StudyConfig, TableSpec, TrialResult, make_table, run_study, trial_fn,
    };

    fn table(spec: TableSpec) -> PivotTable {
        let grid = ParameterGrid::new()
            .with("n", [10, 20])
            .with("loc", [0.0, 0.5])
            .with("scale", [1, 2]);
        let trial = trial_fn(|params, _ctx| {
            let n = params.f64("n")?;
            if n == 20.0 && params.f64("loc")? == 0.5 && params.i64("scale")? == 2 {
                return Err("no luck".into());
            }
            Ok(TrialResult::from([
                ("mean", n + params.f64("loc")?),
                ("sd", params.f64("scale")?),
            ]))
        });
        let output = run_study(&trial, &grid, &StudyConfig::new(2).seed(1)).unwrap();
        make_table(&output.result, &spec).unwrap()
    }

    #[test]
    fn test_stacked_layout() {
        let out = render_table(&table(
            TableSpec::new().rows(["n"]).cols(["loc", "scale"]).digits(2),
        ));
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].contains("mean") && lines[0].contains("sd"));
        assert!(lines[1].contains("scale=1") && lines[1].contains("scale=2"));
        assert!(lines[2].starts_with('n'));
        assert_eq!(lines[2].matches("loc=0.5").count(), 4);
        assert!(lines[3].starts_with("10"));
        assert!(lines[3].contains("10.00") && lines[3].contains("10.50"));
        assert!(lines[4].starts_with("20"));
        assert_eq!(lines[4].matches(MISSING).count(), 2);
        assert!(out.contains("repetitions: 2, trials: 16, failures: 2"));
    }

    #[test]
    fn test_separate_layout_prints_one_table_per_field() {
        let out = render_table(&table(
            TableSpec::new()
                .rows(["loc", "n"])
                .cols(["scale"])
                .layout(FieldLayout::Separate)
                .include_metadata(false),
        ));
        assert!(out.starts_with("[mean]\n"));
        assert!(out.contains("\n[sd]\n"));
        assert!(!out.contains("repetitions:"));
        assert!(out.lines().any(|l| l.starts_with("n  loc")));
    }

    #[test]
    fn test_fixed_parameters_and_digits() {
        let out = render_table(&table(
            TableSpec::new()
                .rows(["n"])
                .cols(["loc"])
                .partial("scale", [1])
                .fields(["mean"])
                .digits(0),
        ));
        assert!(out.starts_with("fixed: scale=1\n"));
        assert!(out.lines().any(|l| l.starts_with("20") && !l.contains('.')));
    }

    #[test]
    fn test_width_scale_widens_cells() {
        let narrow = render_table(&table(
            TableSpec::new().rows(["scale", "loc", "n"]).fields(["sd"]),
        ));
        let wide = render_table(&table(
            TableSpec::new()
                .rows(["scale", "loc", "n"])
                .fields(["sd"])
                .width_scale(2.0),
        ));
        let last = |s: &str| s.lines().nth(1).map(str::len).unwrap_or(0);
        assert!(last(&wide) > last(&narrow));
    }

    fn text_table(width_scale: f64) -> String {
        let grid = ParameterGrid::new()
            .with("n", [1, 2])
            .with("dist", ["ab", "χχχχ"]);
        let trial = trial_fn(|params, _ctx| Ok(TrialResult::single("x", params.f64("n")?)));
        let output = run_study(&trial, &grid, &StudyConfig::new(1).seed(1)).unwrap();
        let spec = TableSpec::new()
            .rows(["n"])
            .cols(["dist"])
            .width_scale(width_scale)
            .include_metadata(false);
        render_table(&make_table(&output.result, &spec).unwrap())
    }

    #[test]
    fn test_widths_count_chars_not_bytes() {
        let out = text_table(1.0);
        let widths: Vec<usize> = out.lines().map(width).collect();
        // "n" label, gap, then two cells as wide as "dist=χχχχ"
        assert_eq!(widths, vec![22, 22, 22, 22]);
        assert!(out.lines().nth(1).unwrap().ends_with("dist=χχχχ"));
    }

    #[test]
    fn test_width_scale_is_clamped() {
        let out = text_table(f64::INFINITY);
        let row = out.lines().nth(2).unwrap();
        assert_eq!(width(row), 1 + 2 + 90 + 1 + 90);
        assert_eq!(text_table(f64::NAN), text_table(1.0));
    }
}
