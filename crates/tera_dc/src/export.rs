//! Laying a [`Document`] out as JSON files and loading it back.
//!
//! A [`Unit::Single`] named `Item` is written to `Item.json`, a [`Unit::Multiple`] named
//! `Skill` to `Skill/Skill-0.json`, `Skill/Skill-1.json` and so on. The unit names are
//! also listed, one per line, in `units.order` so that a repack keeps the original order.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::document::{Document, Node, Unit};
use crate::error::{Error, Result};

const EXTENSION: &str = "json";

/// Unit names in document order
pub const ORDER_FILE: &str = "units.order";

fn check_unit_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::InvalidUnitName(name.to_owned()));
    }
    Ok(())
}

fn create(path: &Path, overwrite: bool) -> Result<File> {
    let file = if overwrite {
        File::create(path)?
    } else {
        File::create_new(path)?
    };
    Ok(file)
}

/// Write `node` as tab indented JSON
#[instrument(skip_all, fields(path = %path.display()), err)]
pub fn write_node(path: &Path, node: &Node, overwrite: bool) -> Result<()> {
    let mut writer = BufWriter::new(create(path, overwrite)?);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"\t"));
    node.serialize(&mut serializer)?;
    writer.flush()?;
    Ok(())
}

/// Read a node written by [`write_node`]
#[instrument(skip_all, fields(path = %path.display()), err)]
pub fn read_node(path: &Path) -> Result<Node> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Remove every unit [`read_document`] would load from `dir`
fn clear_units(dir: &Path) -> Result<()> {
    let entries = WalkDir::new(dir).min_depth(1).max_depth(1);
    for entry in entries {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            debug!("removing {}", path.display());
            fs::remove_dir_all(path)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some(EXTENSION) {
            debug!("removing {}", path.display());
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Write every unit of `document` below `dir`
///
/// Without `overwrite` existing files are left alone and writing one fails. With it, the
/// units already in `dir` are removed first so that no stale node survives.
#[instrument(skip_all, fields(dir = %dir.as_ref().display(), units = document.len()), err)]
pub fn write_document(dir: impl AsRef<Path>, document: &Document, overwrite: bool) -> Result<()> {
    let dir = dir.as_ref();
    for name in document.names() {
        check_unit_name(name)?;
    }

    fs::create_dir_all(dir)?;
    if overwrite {
        clear_units(dir)?;
    }

    for (name, unit) in document.iter() {
        if unit.is_directory() {
            fs::create_dir_all(dir.join(name))?;
        }
        for (i, node) in unit.nodes().iter().enumerate() {
            write_node(&unit_path(dir, name, unit, i), node, overwrite)?;
        }
        debug!(name, files = unit.nodes().len(), "wrote unit");
    }

    let mut order = BufWriter::new(create(&dir.join(ORDER_FILE), overwrite)?);
    for name in document.names() {
        writeln!(order, "{name}")?;
    }
    order.flush()?;

    info!("wrote {} units to {}", document.len(), dir.display());
    Ok(())
}

enum Pending {
    Single(Node),
    Multiple(Vec<(usize, Node)>),
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidUnitName(path.display().to_string()))
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidUnitName(path.display().to_string()))
}

fn read_order(dir: &Path) -> Result<Option<Vec<String>>> {
    match fs::read_to_string(dir.join(ORDER_FILE)) {
        Ok(order) => Ok(Some(
            order
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Load a document written by [`write_document`]
///
/// Units listed in [`ORDER_FILE`] come first, in that order. The others follow ordered by
/// file name. Files that are not JSON are skipped.
#[instrument(skip_all, fields(dir = %dir.as_ref().display()), err)]
pub fn read_document(dir: impl AsRef<Path>) -> Result<Document> {
    let dir = dir.as_ref();
    let mut units: IndexMap<String, Pending> = IndexMap::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name();
    for entry in entries {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            let name = file_name(path)?;
            if units.insert(name.clone(), Pending::Multiple(Vec::new())).is_some() {
                return Err(Error::InvalidUnitName(name));
            }
            continue;
        }

        if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
            debug!("skipping {}", path.display());
            continue;
        }

        let stem = file_stem(path)?;
        let node = read_node(path)?;

        if entry.depth() == 1 {
            if units.insert(stem.clone(), Pending::Single(node)).is_some() {
                return Err(Error::InvalidUnitName(stem));
            }
            continue;
        }

        let unit = path.parent().map(file_name).transpose()?.unwrap_or_default();
        let index = stem
            .strip_prefix(&format!("{unit}-"))
            .and_then(|index| index.parse::<usize>().ok())
            .ok_or_else(|| Error::InvalidUnitName(stem.clone()))?;

        match units.get_mut(&unit) {
            Some(Pending::Multiple(nodes)) => nodes.push((index, node)),
            _ => return Err(Error::InvalidUnitName(unit)),
        }
    }

    if let Some(order) = read_order(dir)? {
        let mut ordered = IndexMap::with_capacity(units.len());
        for name in order {
            if let Some(pending) = units.shift_remove(&name) {
                ordered.insert(name, pending);
            }
        }
        ordered.extend(units);
        units = ordered;
    }

    Ok(units
        .into_iter()
        .map(|(name, pending)| {
            let unit = match pending {
                Pending::Single(node) => Unit::Single(node),
                Pending::Multiple(mut nodes) => {
                    nodes.sort_by_key(|(index, _)| *index);
                    Unit::Multiple(nodes.into_iter().map(|(_, node)| node).collect())
                }
            };
            (name, unit)
        })
        .collect())
}

/// Path of the file holding the `index`th node of `unit`
pub fn unit_path(dir: &Path, name: &str, unit: &Unit, index: usize) -> PathBuf {
    match unit {
        Unit::Single(_) => dir.join(format!("{name}.{EXTENSION}")),
        Unit::Multiple(_) => dir.join(name).join(format!("{name}-{index}.{EXTENSION}")),
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::document::{Document, Node, Unit, Value};
    use crate::error::{Error, Result};
    use crate::export::{read_document, unit_path, write_document, ORDER_FILE};

    fn document() -> Document {
        let skills = (0..3)
            .map(|id| {
                let mut node = Node::new();
                node.insert_value("id", Value::Integer(id));
                node
            })
            .collect::<Vec<_>>();

        let mut item = Node::new();
        item.insert_value("weight", Value::Float(0.5));
        item.push_child("Effect", Node::new());

        [
            ("Item".to_owned(), Unit::Single(item)),
            ("Skill".to_owned(), Unit::from(skills)),
        ]
        .into_iter()
        .collect()
    }

    #[traced_test]
    #[test]
    fn layout_on_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let document = document();
        write_document(dir.path(), &document, false)?;

        assert!(dir.path().join("Item.json").is_file());
        for i in 0..3 {
            assert!(dir.path().join(format!("Skill/Skill-{i}.json")).is_file());
        }

        let item = fs::read_to_string(dir.path().join("Item.json"))?;
        assert_eq!(item, "{\n\t\"weight\": 0.5,\n\t\"Effect\": [\n\t\t{}\n\t]\n}");

        Ok(())
    }

    #[test]
    fn read_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let document = document();
        write_document(dir.path(), &document, false)?;

        assert_eq!(read_document(dir.path())?, document);

        Ok(())
    }

    #[test]
    fn numeric_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nodes = (0..12)
            .map(|id| {
                let mut node = Node::new();
                node.insert_value("id", Value::Integer(id));
                node
            })
            .collect::<Vec<_>>();
        let document = [("Quest".to_owned(), Unit::from(nodes))]
            .into_iter()
            .collect::<Document>();
        write_document(dir.path(), &document, false)?;

        assert_eq!(read_document(dir.path())?, document);

        Ok(())
    }

    #[test]
    fn keeps_unit_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut document = skills(2);
        document.insert("Item", Unit::Single(Node::new()));
        document.insert("Effect", Unit::Single(Node::new()));
        write_document(dir.path(), &document, false)?;

        assert_eq!(
            fs::read_to_string(dir.path().join(ORDER_FILE))?,
            "Skill\nItem\nEffect\n"
        );
        assert_eq!(
            read_document(dir.path())?.names().collect::<Vec<_>>(),
            vec!["Skill", "Item", "Effect"]
        );

        Ok(())
    }

    #[test]
    fn unlisted_units_follow_file_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_document(dir.path(), &skills(2), false)?;
        fs::write(dir.path().join("Item.json"), "{}")?;
        fs::write(dir.path().join("Area.json"), "{}")?;

        assert_eq!(
            read_document(dir.path())?.names().collect::<Vec<_>>(),
            vec!["Skill", "Area", "Item"]
        );

        fs::remove_file(dir.path().join(ORDER_FILE))?;
        assert_eq!(
            read_document(dir.path())?.names().collect::<Vec<_>>(),
            vec!["Area", "Item", "Skill"]
        );

        Ok(())
    }

    #[test]
    fn refuses_to_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let document = document();
        write_document(dir.path(), &document, false)?;

        assert!(matches!(
            write_document(dir.path(), &document, false),
            Err(Error::IOError(_))
        ));
        write_document(dir.path(), &document, true)?;

        Ok(())
    }

    fn skills(count: i32) -> Document {
        let nodes = (0..count)
            .map(|id| {
                let mut node = Node::new();
                node.insert_value("id", Value::Integer(id));
                node
            })
            .collect::<Vec<_>>();
        [("Skill".to_owned(), Unit::from(nodes))].into_iter().collect()
    }

    #[traced_test]
    #[test]
    fn overwrite_drops_stale_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_document(dir.path(), &skills(3), false)?;
        write_document(dir.path(), &skills(2), true)?;

        assert!(!dir.path().join("Skill/Skill-2.json").exists());
        assert_eq!(read_document(dir.path())?, skills(2));

        Ok(())
    }

    #[test]
    fn overwrite_drops_missing_units() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_document(dir.path(), &document(), false)?;
        fs::write(dir.path().join("notes.txt"), "kept")?;
        write_document(dir.path(), &skills(3), true)?;

        assert!(!dir.path().join("Item.json").exists());
        assert!(dir.path().join("notes.txt").is_file());
        assert_eq!(read_document(dir.path())?, skills(3));

        Ok(())
    }

    #[test]
    fn overwrite_switches_unit_kind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_document(dir.path(), &skills(3), false)?;
        write_document(dir.path(), &skills(1), true)?;

        assert!(dir.path().join("Skill.json").is_file());
        assert!(!dir.path().join("Skill").exists());
        assert_eq!(read_document(dir.path())?, skills(1));

        Ok(())
    }

    #[test]
    fn invalid_unit_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["", "..", "a/b", "a\\b"] {
            let document = [(name.to_owned(), Unit::Single(Node::new()))]
                .into_iter()
                .collect::<Document>();
            assert!(matches!(
                write_document(dir.path(), &document, false),
                Err(Error::InvalidUnitName(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn bad_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("Item.json"), "[1, 2]")?;

        assert!(matches!(
            read_document(dir.path()),
            Err(Error::JsonError(_))
        ));

        Ok(())
    }

    #[test]
    fn unit_paths() {
        let dir = std::path::Path::new("out");
        assert_eq!(
            unit_path(dir, "Item", &Unit::Single(Node::new()), 0),
            dir.join("Item.json")
        );
        assert_eq!(
            unit_path(dir, "Skill", &Unit::Multiple(Vec::new()), 2),
            dir.join("Skill").join("Skill-2.json")
        );
    }
}
