//! Declarative layout of the task sheets and the index sheet.
//!
//! Planning is pure: it turns groups into a list of [`SheetOp`]s that an
//! adapter executes against a real workbook.

use crate::types::CategoryGroup;

/// Column widths of a task sheet (B, C), in pixels.
const TASK_COLUMN_WIDTHS: [u16; 2] = [400, 600];

/// Width of each index column, in pixels.
const INDEX_COLUMN_WIDTH: u16 = 150;

/// Tab colour of the index sheet.
const INDEX_TAB_COLOR: u32 = 0xFF8C00;

/// Semantic cell styles; the adapter decides how they look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    /// Task sheet column header.
    Header,
    /// "Back to Index" link in A1.
    BackLink,
    /// Task sheet body cell.
    Body,
    /// Category header of an index column.
    IndexHeader,
    /// Sub-category link under an index header.
    IndexEntry,
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// External URL (e.g. a slide).
    Url(String),
    /// Another sheet of the same workbook, by plan name.
    Sheet(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Link { target: LinkTarget, text: String },
}

/// One step of a workbook update. Rows and columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetOp {
    DeleteSheetsExcept { keep: String },
    ClearSheet { sheet: String },
    CreateSheet { sheet: String },
    WriteCell {
        sheet: String,
        row: u32,
        col: u16,
        value: CellValue,
        style: CellStyle,
    },
    SetColumnWidth { sheet: String, col: u16, pixels: u16 },
    SetTabColor { sheet: String, rgb: u32 },
}

/// Ordered operations that bring a workbook up to date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookPlan {
    pub ops: Vec<SheetOp>,
}

impl WorkbookPlan {
    /// Names of the sheets this plan creates, in order.
    pub fn created_sheets(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SheetOp::CreateSheet { sheet } => Some(sheet.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Cells written to `sheet`, in write order.
    pub fn cells(&self, sheet: &str) -> Vec<(u32, u16, &CellValue)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SheetOp::WriteCell {
                    sheet: s,
                    row,
                    col,
                    value,
                    ..
                } if s == sheet => Some((*row, *col, value)),
                _ => None,
            })
            .collect()
    }
}

/// Delete every sheet but the index, then write one sheet per group and the index.
pub fn plan_workbook(groups: &[CategoryGroup], index_sheet: &str) -> WorkbookPlan {
    let mut plan = plan_reset(index_sheet);
    let names = unique_sheet_names(groups, index_sheet);

    for (group, name) in groups.iter().zip(&names) {
        plan_task_sheet(&mut plan.ops, group, name, index_sheet);
    }
    plan_index_sheet(&mut plan.ops, groups, &names, index_sheet);
    plan
}

/// Delete every sheet but the index and clear the index.
pub fn plan_reset(index_sheet: &str) -> WorkbookPlan {
    WorkbookPlan {
        ops: vec![
            SheetOp::DeleteSheetsExcept {
                keep: index_sheet.to_string(),
            },
            SheetOp::ClearSheet {
                sheet: index_sheet.to_string(),
            },
        ],
    }
}

/// Group sheet names, with ` (2)`, ` (3)` ... on repeats.
fn unique_sheet_names(groups: &[CategoryGroup], index_sheet: &str) -> Vec<String> {
    let mut used: Vec<String> = vec![index_sheet.to_string()];
    groups
        .iter()
        .map(|group| {
            let base = group.sheet_name();
            let mut name = base.clone();
            let mut n = 2;
            while used.contains(&name) {
                name = format!("{} ({})", base, n);
                n += 1;
            }
            used.push(name.clone());
            name
        })
        .collect()
}

fn plan_task_sheet(ops: &mut Vec<SheetOp>, group: &CategoryGroup, name: &str, index_sheet: &str) {
    let sheet = name.to_string();
    ops.push(SheetOp::CreateSheet {
        sheet: sheet.clone(),
    });

    ops.push(SheetOp::WriteCell {
        sheet: sheet.clone(),
        row: 0,
        col: 0,
        value: CellValue::Link {
            target: LinkTarget::Sheet(index_sheet.to_string()),
            text: "Back to Index".to_string(),
        },
        style: CellStyle::BackLink,
    });

    for (col, header) in [(1, "Task"), (2, "Summary")] {
        ops.push(SheetOp::WriteCell {
            sheet: sheet.clone(),
            row: 0,
            col,
            value: CellValue::Text(header.to_string()),
            style: CellStyle::Header,
        });
    }

    for (i, task) in group.tasks.iter().enumerate() {
        let row = i as u32 + 1;
        ops.push(SheetOp::WriteCell {
            sheet: sheet.clone(),
            row,
            col: 1,
            value: CellValue::Link {
                target: LinkTarget::Url(task.source_ref.clone()),
                text: task.name.clone(),
            },
            style: CellStyle::Body,
        });
        ops.push(SheetOp::WriteCell {
            sheet: sheet.clone(),
            row,
            col: 2,
            value: CellValue::Text(task.summary.clone()),
            style: CellStyle::Body,
        });
    }

    for (offset, pixels) in TASK_COLUMN_WIDTHS.iter().enumerate() {
        ops.push(SheetOp::SetColumnWidth {
            sheet: sheet.clone(),
            col: 1 + offset as u16,
            pixels: *pixels,
        });
    }
}

/// One column per work category (first-seen order), one link per group sheet.
fn plan_index_sheet(
    ops: &mut Vec<SheetOp>,
    groups: &[CategoryGroup],
    names: &[String],
    index_sheet: &str,
) {
    let mut columns: Vec<(&str, Vec<(&str, &str)>)> = Vec::new();
    for (group, name) in groups.iter().zip(names) {
        let entry = (group.sub_work_category.as_str(), name.as_str());
        match columns.iter_mut().find(|(work, _)| *work == group.work_category) {
            Some((_, entries)) => entries.push(entry),
            None => columns.push((group.work_category.as_str(), vec![entry])),
        }
    }

    for (col, (work, entries)) in columns.iter().enumerate() {
        let col = col as u16;
        ops.push(SheetOp::WriteCell {
            sheet: index_sheet.to_string(),
            row: 0,
            col,
            value: CellValue::Text(work.to_string()),
            style: CellStyle::IndexHeader,
        });
        for (i, (sub, sheet)) in entries.iter().enumerate() {
            ops.push(SheetOp::WriteCell {
                sheet: index_sheet.to_string(),
                row: i as u32 + 1,
                col,
                value: CellValue::Link {
                    target: LinkTarget::Sheet(sheet.to_string()),
                    text: sub.to_string(),
                },
                style: CellStyle::IndexEntry,
            });
        }
        ops.push(SheetOp::SetColumnWidth {
            sheet: index_sheet.to_string(),
            col,
            pixels: INDEX_COLUMN_WIDTH,
        });
    }

    ops.push(SheetOp::SetTabColor {
        sheet: index_sheet.to_string(),
        rgb: INDEX_TAB_COLOR,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskRecord;

    fn group(work: &str, sub: &str, tasks: &[&str]) -> CategoryGroup {
        let mut g = CategoryGroup::new(work, sub);
        for t in tasks {
            g.tasks.push(TaskRecord::new(*t, format!("{} summary", t), format!("#{}", t)));
        }
        g
    }

    #[test]
    fn test_plan_starts_by_deleting_and_clearing() {
        let plan = plan_workbook(&[group("A", "x", &["t1"])], "Index");
        assert_eq!(
            plan.ops[..2],
            [
                SheetOp::DeleteSheetsExcept {
                    keep: "Index".to_string()
                },
                SheetOp::ClearSheet {
                    sheet: "Index".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_task_sheet_layout() {
        let plan = plan_workbook(&[group("A", "x", &["t1", "t2"])], "Index");
        assert_eq!(plan.created_sheets(), vec!["A: x"]);

        let cells = plan.cells("A: x");
        assert_eq!(
            cells[0],
            (
                0,
                0,
                &CellValue::Link {
                    target: LinkTarget::Sheet("Index".to_string()),
                    text: "Back to Index".to_string()
                }
            )
        );
        assert_eq!(cells[1], (0, 1, &CellValue::Text("Task".to_string())));
        assert_eq!(cells[2], (0, 2, &CellValue::Text("Summary".to_string())));
        assert_eq!(
            cells[3],
            (
                1,
                1,
                &CellValue::Link {
                    target: LinkTarget::Url("#t1".to_string()),
                    text: "t1".to_string()
                }
            )
        );
        assert_eq!(cells[4], (1, 2, &CellValue::Text("t1 summary".to_string())));
        assert_eq!(cells[6], (2, 2, &CellValue::Text("t2 summary".to_string())));

        assert!(plan.ops.contains(&SheetOp::SetColumnWidth {
            sheet: "A: x".to_string(),
            col: 2,
            pixels: 600,
        }));
    }

    #[test]
    fn test_repeated_group_gets_suffixed_sheet() {
        let groups = [
            group("A", "x", &["t1"]),
            group("B", "y", &["t2"]),
            group("A", "x", &["t3"]),
        ];
        let plan = plan_workbook(&groups, "Index");
        assert_eq!(plan.created_sheets(), vec!["A: x", "B: y", "A: x (2)"]);
    }

    #[test]
    fn test_index_columns_by_work_category() {
        let groups = [
            group("A", "x", &["t1"]),
            group("B", "y", &["t2"]),
            group("A", "z", &["t3"]),
        ];
        let plan = plan_workbook(&groups, "Index");
        let cells = plan.cells("Index");

        assert_eq!(cells[0], (0, 0, &CellValue::Text("A".to_string())));
        assert_eq!(
            cells[1],
            (
                1,
                0,
                &CellValue::Link {
                    target: LinkTarget::Sheet("A: x".to_string()),
                    text: "x".to_string()
                }
            )
        );
        assert_eq!(
            cells[2],
            (
                2,
                0,
                &CellValue::Link {
                    target: LinkTarget::Sheet("A: z".to_string()),
                    text: "z".to_string()
                }
            )
        );
        assert_eq!(cells[3], (0, 1, &CellValue::Text("B".to_string())));
        assert_eq!(plan.ops.last(), Some(&SheetOp::SetTabColor {
            sheet: "Index".to_string(),
            rgb: 0xFF8C00,
        }));
    }

    #[test]
    fn test_reset_plan() {
        let plan = plan_reset("Index");
        assert_eq!(plan.ops.len(), 2);
        assert!(plan.created_sheets().is_empty());
    }

    #[test]
    fn test_empty_groups_plan_only_index() {
        let plan = plan_workbook(&[], "Index");
        assert!(plan.created_sheets().is_empty());
        assert!(plan.cells("Index").is_empty());
    }
}
