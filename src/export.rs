use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::model::{RankedPlayer, ScoredPlayer};
use crate::position_rules::Role;

const HEADER: [&str; 16] = [
    "Rank",
    "Player",
    "Age",
    "Club",
    "League",
    "Nationality",
    "Positions",
    "Foot",
    "Height (cm)",
    "Market Value",
    "Rank Score",
    "Current Score",
    "Future Score",
    "Growth",
    "Trajectory",
    "Confidence",
];

pub struct ExportReport {
    pub sheets: usize,
    pub rows: usize,
}

/// One worksheet per role, rows in ranked order.
pub fn write_ranked_workbook(
    path: &Path,
    sheets: &[(Role, Vec<RankedPlayer>)],
) -> Result<ExportReport> {
    let mut workbook = Workbook::new();
    let mut rows_written = 0usize;

    for (role, ranked) in sheets {
        let mut rows = vec![HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
        rows.extend(ranked.iter().map(ranked_row));
        rows_written += ranked.len();

        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(role.label())
            .with_context(|| format!("name worksheet {}", role.label()))?;
        write_rows(worksheet, &rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;

    Ok(ExportReport {
        sheets: sheets.len(),
        rows: rows_written,
    })
}

fn ranked_row(row: &RankedPlayer) -> Vec<String> {
    let ScoredPlayer { player, rank_score } = &row.entry.item;
    let insights = row.entry.insights.as_ref();
    vec![
        row.id.to_string(),
        player.name.clone().unwrap_or_default(),
        opt_to_string(player.age),
        player.club.clone().unwrap_or_default(),
        player.league.clone().unwrap_or_default(),
        player.nationality.clone().unwrap_or_default(),
        player.positions.clone().unwrap_or_default(),
        player.footed.clone().unwrap_or_default(),
        opt_to_string(player.height_cm),
        player.market_value.clone(),
        format!("{rank_score:.2}"),
        opt_to_string(insights.and_then(|a| a.current_score)),
        opt_to_string(insights.and_then(|a| a.future_score)),
        opt_to_string(insights.and_then(|a| a.score_growth)),
        insights.map(|a| a.trajectory_label.clone()).unwrap_or_default(),
        opt_to_string(insights.map(|a| a.confidence)),
    ]
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
