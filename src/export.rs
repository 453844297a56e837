//! Saving tables and plot payloads for external tools.
//!
//! JSON plots follow the payload layout of the MPDS web plotter
//! (<https://mpds.io/visavis>); CSV works with any plotting application.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    /// `x`/`y` columns.
    Bar,
    /// `x`/`y`/`z`/label/mesh-id columns.
    Plot3d,
}

impl PlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Plot3d => "plot3d",
        }
    }

    fn columns_needed(self) -> usize {
        match self {
            Self::Bar => 2,
            Self::Plot3d => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Default for Exporter {
    /// Exports into `<temp dir>/_MPDS`.
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("_MPDS"))
    }
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the given columns as CSV, or as a plot payload in JSON.
    /// `extra` entries are merged into the JSON payload.
    pub fn save_plot(
        &self,
        table: &Table,
        columns: &[&str],
        kind: PlotKind,
        format: ExportFormat,
        extra: Map<String, Value>,
    ) -> Result<PathBuf> {
        self.ensure_dir()?;

        if let Some(missing) = columns.iter().find(|c| table.column_index(c).is_none()) {
            return Err(Error::Export(format!(
                "column `{missing}` is not in the table"
            )));
        }

        match format {
            ExportFormat::Csv => {
                let path = self.dir.join(format!("{}.csv", basename()));
                let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
                table.select(columns)?.write_csv(BufWriter::new(file))?;
                tracing::debug!(path = %path.display(), "saved CSV plot data");
                Ok(path)
            }
            ExportFormat::Json => {
                if columns.len() < kind.columns_needed() {
                    return Err(Error::Export(format!(
                        "{} plot needs {} column(s), got {}",
                        kind.as_str(),
                        kind.columns_needed(),
                        columns.len()
                    )));
                }

                let mut payload = match kind {
                    PlotKind::Bar => bar_payload(table, columns)?,
                    PlotKind::Plot3d => plot3d_payload(table, columns)?,
                };
                payload.extend(extra);
                let plot = json!({
                    "use_visavis_type": kind.as_str(),
                    "payload": payload,
                });

                let path = self.dir.join(format!("{}.json", basename()));
                write_json(&path, &plot)?;
                tracing::debug!(path = %path.display(), kind = kind.as_str(), "saved plot payload");
                Ok(path)
            }
        }
    }

    /// Saves the whole table as JSON under `df<tag>_<random>.json`.
    pub fn save_table(&self, table: &Table, tag: Option<&str>) -> Result<PathBuf> {
        self.ensure_dir()?;
        let tag = tag.unwrap_or("-");
        let path = self.dir.join(format!("df{tag}_{}.json", basename()));
        write_json(&path, table)?;
        tracing::debug!(path = %path.display(), rows = table.len(), "saved table");
        Ok(path)
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        // Permission bits do not tell whether this process may write here.
        let probe = self.dir.join(format!(".write_{}", basename()));
        match std::fs::OpenOptions::new().write(true).create_new(true).open(&probe) {
            Ok(_) => std::fs::remove_file(&probe).map_err(|e| Error::io(&probe, e)),
            Err(e) => Err(Error::Export(format!(
                "{} is not writable ({e})",
                self.dir.display()
            ))),
        }
    }
}

/// Axis title for a column name.
pub fn human_title(term: &str) -> String {
    match term {
        "length" => "Bond lengths, A".to_string(),
        "occurrence" => "Counts".to_string(),
        "bandgap" => "Band gap, eV".to_string(),
        _ => capitalize(term),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn basename() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

fn column_values(table: &Table, name: &str) -> Result<Vec<Value>> {
    table
        .column(name)
        .map(|c| c.into_iter().cloned().collect())
        .ok_or_else(|| Error::Export(format!("column `{name}` is not in the table")))
}

fn bar_payload(table: &Table, columns: &[&str]) -> Result<Map<String, Value>> {
    let mut payload = Map::new();
    payload.insert("x".into(), json!([column_values(table, columns[0])?]));
    payload.insert("y".into(), Value::Array(column_values(table, columns[1])?));
    payload.insert("xtitle".into(), human_title(columns[0]).into());
    payload.insert("ytitle".into(), human_title(columns[1]).into());
    Ok(payload)
}

#[derive(Default, Serialize)]
struct Mesh {
    x: Vec<Value>,
    y: Vec<Value>,
    z: Vec<Value>,
}

/// Points plus meshes; a new mesh starts whenever the mesh column changes.
fn plot3d_payload(table: &Table, columns: &[&str]) -> Result<Map<String, Value>> {
    let [x, y, z, labels, mesh_ids] = [0, 1, 2, 3, 4].map(|i| column_values(table, columns[i]));
    let (x, y, z, labels, mesh_ids) = (x?, y?, z?, labels?, mesh_ids?);

    let mut meshes: Vec<Mesh> = Vec::new();
    let mut recent: Option<&Value> = None;
    for (i, id) in mesh_ids.iter().enumerate() {
        if recent != Some(id) {
            meshes.push(Mesh::default());
        }
        recent = Some(id);
        if let Some(mesh) = meshes.last_mut() {
            mesh.x.push(x[i].clone());
            mesh.y.push(y[i].clone());
            mesh.z.push(z[i].clone());
        }
    }

    let mut payload = Map::new();
    payload.insert(
        "points".into(),
        json!({ "x": x, "y": y, "z": z, "labels": labels }),
    );
    payload.insert("meshes".into(), serde_json::to_value(meshes)?);
    payload.insert("xtitle".into(), human_title(columns[0]).into());
    payload.insert("ytitle".into(), human_title(columns[1]).into());
    payload.insert("ztitle".into(), human_title(columns[2]).into());
    Ok(payload)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    out.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bonds() -> Table {
        Table::from_entries(
            ["length", "occurrence"],
            vec![
                json!([1.2, 10]),
                json!([1.5, 15]),
                json!([1.8, 8]),
                json!([2.0, 20]),
                json!([2.2, 12]),
            ],
        )
        .unwrap()
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn bar_plot_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("nested"));
        let path = exporter
            .save_plot(&bonds(), &["length", "occurrence"], PlotKind::Bar, ExportFormat::Csv, Map::new())
            .unwrap();
        assert!(path.is_file());
        assert_eq!(path.extension().unwrap(), "csv");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("length,occurrence\n1.2,10\n"));
    }

    #[test]
    fn bar_plot_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let mut extra = Map::new();
        extra.insert("subtitle".into(), json!("binary oxides"));
        let path = exporter
            .save_plot(&bonds(), &["length", "occurrence"], PlotKind::Bar, ExportFormat::Json, extra)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "json");

        let plot = read_json(&path);
        assert_eq!(plot["use_visavis_type"], "bar");
        assert_eq!(plot["payload"]["x"], json!([[1.2, 1.5, 1.8, 2.0, 2.2]]));
        assert_eq!(plot["payload"]["y"], json!([10, 15, 8, 20, 12]));
        assert_eq!(plot["payload"]["xtitle"], "Bond lengths, A");
        assert_eq!(plot["payload"]["ytitle"], "Counts");
        assert_eq!(plot["payload"]["subtitle"], "binary oxides");
    }

    #[test]
    fn plot3d_splits_meshes() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_entries(
            ["x", "y", "z", "labels", "meshes_id"],
            vec![
                json!([1, 5, 9, "A", 1]),
                json!([2, 6, 10, "B", 1]),
                json!([3, 7, 11, "C", 2]),
                json!([4, 8, 12, "D", 2]),
            ],
        )
        .unwrap();
        let path = Exporter::new(dir.path())
            .save_plot(
                &table,
                &["x", "y", "z", "labels", "meshes_id"],
                PlotKind::Plot3d,
                ExportFormat::Json,
                Map::new(),
            )
            .unwrap();

        let payload = read_json(&path)["payload"].clone();
        assert_eq!(payload["points"]["labels"], json!(["A", "B", "C", "D"]));
        assert_eq!(
            payload["meshes"],
            json!([
                {"x": [1, 2], "y": [5, 6], "z": [9, 10]},
                {"x": [3, 4], "y": [7, 8], "z": [11, 12]}
            ])
        );
        assert_eq!(payload["ztitle"], "Z");
    }

    #[test]
    fn unknown_columns_and_short_selections_fail() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let err = exporter
            .save_plot(&bonds(), &["length", "bandgap"], PlotKind::Bar, ExportFormat::Json, Map::new())
            .unwrap_err();
        assert!(matches!(err, Error::Export(_)));

        let err = exporter
            .save_plot(&bonds(), &["length", "occurrence"], PlotKind::Plot3d, ExportFormat::Json, Map::new())
            .unwrap_err();
        assert!(matches!(err, Error::Export(_)));
    }

    #[test]
    fn table_round_trips_through_save_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = Exporter::new(dir.path()).save_table(&bonds(), Some("test")).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("dftest_"));
        assert_eq!(name.len(), "dftest_".len() + 12 + ".json".len());

        let back: Table = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, bonds());
    }

    #[test]
    fn directory_below_a_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        let err = Exporter::new(file.join("_MPDS"))
            .save_table(&bonds(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_refused() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users write anyway; nothing to check then.
        let writable = std::fs::write(dir.path().join("check"), "x").is_ok();
        let result = Exporter::new(dir.path()).save_table(&bonds(), None);
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        if !writable {
            assert!(matches!(result, Err(Error::Export(_))), "{result:?}");
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        }
    }

    #[test]
    fn titles() {
        assert_eq!(human_title("bandgap"), "Band gap, eV");
        assert_eq!(human_title("density"), "Density");
        assert_eq!(human_title(""), "");
    }
}
