//! Hierarchical aggregation of raw observations for inspection and export.
//!
//! Groups two entities' intensities as primary category → ordered list of
//! secondary categories (e.g. tissue → cell types). Keys are stored raw;
//! [`display_label`] is applied only when presenting or exporting.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use coexpr_common::entities::{Axis, ObservedExpression};
use coexpr_common::error::Result;

/// One secondary-category row inside a primary group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub secondary: String,
    pub entity1_intensity: f64,
    pub entity2_intensity: f64,
}

/// Primary category → secondary entries, both ordered by raw key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedExpression {
    groups: BTreeMap<String, Vec<GroupEntry>>,
}

/// Presentation form of one primary group.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayGroup {
    pub key: String,
    pub label: String,
    pub entries: Vec<DisplayEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayEntry {
    pub key: String,
    pub label: String,
    pub entity1_intensity: f64,
    pub entity2_intensity: f64,
}

impl GroupedExpression {
    pub fn get(&self, primary: &str) -> Option<&[GroupEntry]> {
        self.groups.get(primary).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<GroupEntry>)> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize { self.groups.len() }
    pub fn is_empty(&self) -> bool { self.groups.is_empty() }

    /// Total number of secondary entries across all groups.
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Presentation copy with formatted labels; raw keys are kept alongside.
    pub fn to_display(&self) -> Vec<DisplayGroup> {
        self.groups
            .iter()
            .map(|(primary, entries)| DisplayGroup {
                key: primary.clone(),
                label: display_label(primary),
                entries: entries
                    .iter()
                    .map(|e| DisplayEntry {
                        key: e.secondary.clone(),
                        label: display_label(&e.secondary),
                        entity1_intensity: e.entity1_intensity,
                        entity2_intensity: e.entity2_intensity,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Group two entities' observations by `primary` then `secondary` axis.
///
/// Duplicate (entity, primary, secondary) observations are averaged. Entries
/// where both entities have zero intensity are dropped.
pub fn group(
    records: &[ObservedExpression],
    entity1: &str,
    entity2: &str,
    primary: Axis,
    secondary: Axis,
) -> GroupedExpression {
    // (primary, secondary) → per-entity (sum, count)
    let mut acc: BTreeMap<(String, String), [(f64, usize); 2]> = BTreeMap::new();

    for r in records {
        let slots = [r.matches_entity(entity1), r.matches_entity(entity2)];
        if !slots[0] && !slots[1] {
            continue;
        }
        let (p, s) = (r.category(primary), r.category(secondary));
        if p.is_empty() || s.is_empty() || !r.intensity.is_finite() || r.intensity < 0.0 {
            continue;
        }
        let cell = acc.entry((p.to_string(), s.to_string())).or_default();
        for (i, hit) in slots.iter().enumerate() {
            if *hit {
                cell[i].0 += r.intensity;
                cell[i].1 += 1;
            }
        }
    }

    let mut groups: BTreeMap<String, Vec<GroupEntry>> = BTreeMap::new();
    for ((p, s), [(sum1, n1), (sum2, n2)]) in acc {
        let e1 = if n1 == 0 { 0.0 } else { sum1 / n1 as f64 };
        let e2 = if n2 == 0 { 0.0 } else { sum2 / n2 as f64 };
        if e1 == 0.0 && e2 == 0.0 {
            continue;
        }
        groups.entry(p).or_default().push(GroupEntry {
            secondary: s,
            entity1_intensity: e1,
            entity2_intensity: e2,
        });
    }

    GroupedExpression { groups }
}

/// Expand grouped values back into observations (one per entity per entry).
/// Regrouping the output with the same entities and axes reproduces `groups`.
pub fn flatten(
    groups: &GroupedExpression,
    entity1: &str,
    entity2: &str,
    primary: Axis,
    secondary: Axis,
) -> Vec<ObservedExpression> {
    let mut out = Vec::with_capacity(groups.entry_count() * 2);
    for (p, entries) in groups.iter() {
        for e in entries {
            for (entity, intensity) in [(entity1, e.entity1_intensity), (entity2, e.entity2_intensity)] {
                let mut r = ObservedExpression {
                    entity_id: entity.to_string(),
                    entity_display_name: entity.to_string(),
                    tissue_category: String::new(),
                    cell_category: String::new(),
                    cluster_label: String::new(),
                    intensity,
                };
                set_category(&mut r, primary, p);
                set_category(&mut r, secondary, &e.secondary);
                out.push(r);
            }
        }
    }
    out
}

fn set_category(r: &mut ObservedExpression, axis: Axis, value: &str) {
    let field = match axis {
        Axis::Tissue => &mut r.tissue_category,
        Axis::CellType => &mut r.cell_category,
        Axis::Cluster => &mut r.cluster_label,
    };
    *field = value.to_string();
}

/// Export groups as CSV with display-formatted labels.
pub fn write_csv<W: Write>(
    groups: &GroupedExpression,
    writer: W,
    primary: Axis,
    secondary: Axis,
    entity1: &str,
    entity2: &str,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        display_label(primary.as_str()).as_str(),
        display_label(secondary.as_str()).as_str(),
        entity1,
        entity2,
    ])?;
    for (p, entries) in groups.iter() {
        let p_label = display_label(p);
        for e in entries {
            wtr.write_record([
                p_label.clone(),
                display_label(&e.secondary),
                e.entity1_intensity.to_string(),
                e.entity2_intensity.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Presentation label: underscores become spaces, each word title-cased.
pub fn display_label(raw: &str) -> String {
    raw.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn obs(entity: &str, tissue: &str, cell: &str, intensity: f64) -> ObservedExpression {
        ObservedExpression {
            entity_id: entity.to_string(),
            entity_display_name: entity.to_lowercase(),
            tissue_category: tissue.to_string(),
            cell_category: cell.to_string(),
            cluster_label: "c-0".to_string(),
            intensity,
        }
    }

    fn fixture() -> Vec<ObservedExpression> {
        vec![
            obs("CCL19", "lymph_node", "fibroblasts", 40.0),
            obs("CCR7", "lymph_node", "t-cells", 22.0),
            obs("CCR7", "lymph_node", "b-cells", 8.0),
            obs("CCL19", "lymph_node", "b-cells", 0.0),
            obs("CCL19", "bone_marrow", "granulocytes", 0.0),
            obs("CCR7", "bone_marrow", "granulocytes", 0.0),
            obs("CCL19", "appendix", "fibroblasts", 3.0),
            obs("CCL19", "appendix", "fibroblasts", 5.0),
            obs("MYC", "appendix", "fibroblasts", 99.0),
        ]
    }

    #[test]
    fn test_group_ordering_and_zero_drop() {
        let g = group(&fixture(), "CCL19", "ccr7", Axis::Tissue, Axis::CellType);
        let keys: Vec<&String> = g.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["appendix", "lymph_node"]);

        let ln = g.get("lymph_node").unwrap();
        let secondaries: Vec<&str> = ln.iter().map(|e| e.secondary.as_str()).collect();
        assert_eq!(secondaries, ["b-cells", "fibroblasts", "t-cells"]);
        assert_eq!(ln[0], GroupEntry { secondary: "b-cells".into(), entity1_intensity: 0.0, entity2_intensity: 8.0 });
    }

    #[test]
    fn test_group_averages_duplicates() {
        let g = group(&fixture(), "CCL19", "CCR7", Axis::Tissue, Axis::CellType);
        let appendix = g.get("appendix").unwrap();
        assert_eq!(appendix.len(), 1);
        assert_eq!(appendix[0].entity1_intensity, 4.0);
        assert_eq!(appendix[0].entity2_intensity, 0.0);
    }

    #[test]
    fn test_group_flatten_idempotent() {
        let g = group(&fixture(), "CCL19", "CCR7", Axis::Tissue, Axis::CellType);
        let flat = flatten(&g, "CCL19", "CCR7", Axis::Tissue, Axis::CellType);
        let regrouped = group(&flat, "CCL19", "CCR7", Axis::Tissue, Axis::CellType);
        assert_eq!(g, regrouped);
    }

    #[test]
    fn test_group_other_axes() {
        let g = group(&fixture(), "CCL19", "CCR7", Axis::CellType, Axis::Cluster);
        assert_eq!(g.get("fibroblasts").unwrap()[0].secondary, "c-0");
        assert!(g.get("granulocytes").is_none());
    }

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("lymph_node"), "Lymph Node");
        assert_eq!(display_label("t-cells"), "T-cells");
        assert_eq!(display_label("SMOOTH_muscle_tissue"), "Smooth Muscle Tissue");
        assert_eq!(display_label(""), "");
    }

    #[test]
    fn test_display_keeps_raw_keys() {
        let g = group(&fixture(), "CCL19", "CCR7", Axis::Tissue, Axis::CellType);
        let display = g.to_display();
        assert_eq!(display[1].key, "lymph_node");
        assert_eq!(display[1].label, "Lymph Node");
        // stored values stay raw
        assert!(g.get("lymph_node").is_some());
    }

    #[test]
    fn test_write_csv() {
        let g = group(&fixture(), "CCL19", "CCR7", Axis::Tissue, Axis::CellType);
        let mut buf = Vec::new();
        write_csv(&g, &mut buf, Axis::Tissue, Axis::CellType, "CCL19", "CCR7").unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Tissue,Cell Type,CCL19,CCR7");
        assert_eq!(lines[1], "Appendix,Fibroblasts,4,0");
        assert_eq!(lines.len(), 1 + g.entry_count());
    }
}
