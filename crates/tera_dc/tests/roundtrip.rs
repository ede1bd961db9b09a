use flate2::Compression;
use pretty_assertions::assert_eq;
use tera_dc::crypto::{self, Buffer, FramingHeader};
use tera_dc::document::{Document, Node, Unit, Value};
use tera_dc::error::{Error, Result, Stage};
use tera_dc::read::PLACEHOLDER;
use tera_dc::repack::ContainerTemplate;
use tera_dc::write::{Envelope, WriterOptions};
use tera_dc::{export, partition, DataCenter, KeyMaterial, Repacker};
use tracing_test::traced_test;

const KEY: &str = "1C01C904FF76FF06C211187E197B5716";
const IV: &str = "396C342C52A0C12D511DD0209F90CA7D";

fn keys() -> Result<KeyMaterial> {
    KeyMaterial::from_hex(KEY, IV)
}

fn skill(id: i32, name: &str) -> Node {
    let mut level = Node::new();
    level.insert_value("value", Value::Float(1.5 * id as f32));
    level.insert_value("passive", Value::Boolean(id % 2 == 0));

    let mut node = Node::new();
    node.insert_value("id", Value::Integer(id));
    node.insert_value("name", Value::String(name.into()));
    node.push_child("Level", level.clone());
    node.push_child("Level", level);
    node.push_child(PLACEHOLDER, Node::new());
    node
}

fn document() -> Document {
    let mut item = Node::new();
    item.insert_value("id", Value::Integer(-1));
    item.insert_value("tooltip", Value::String("Ünïcödé 道具 🗡".into()));

    [
        (
            "Skill".to_owned(),
            Unit::from(vec![skill(1, "Slash"), skill(2, "Parry"), skill(3, "Slash")]),
        ),
        ("Item".to_owned(), Unit::Single(item)),
        ("Empty".to_owned(), Unit::Single(Node::new())),
    ]
    .into_iter()
    .collect()
}

fn template() -> ContainerTemplate {
    ContainerTemplate {
        framing: FramingHeader([0x0A, 0x0B, 0x0C, 0x0D]),
        envelope: Envelope::default(),
        root_name: "__root__".into(),
        root_attributes: vec![("build".into(), Value::String("v100".into()))],
    }
}

#[traced_test]
#[test]
fn decode_repack_decode() -> Result<()> {
    let original = Repacker::new(keys()?, template()).repack(&document())?;
    let decoded = partition(&DataCenter::open(&original, &keys()?)?)?;
    assert_eq!(decoded, document());

    let repacked = Repacker::from_container(&original, keys()?)?.repack(&decoded)?;
    assert_eq!(partition(&DataCenter::open(&repacked, &keys()?)?)?, decoded);

    Ok(())
}

#[test]
fn repack_with_small_pages() -> Result<()> {
    let options = WriterOptions::builder()
        .element_page_capacity(8)
        .attribute_page_capacity(4)
        .char_page_capacity(32)
        .compression(Compression::best())
        .build();
    let container = Repacker::new(keys()?, template())
        .with_options(options)
        .repack(&document())?;

    let dc = DataCenter::open(&container, &keys()?)?;
    assert!(dc.elements().pages().len() > 1);
    assert_eq!(partition(&dc)?, document());

    Ok(())
}

#[test]
fn wrong_key_is_deterministic() -> Result<()> {
    let container = Repacker::new(keys()?, template()).repack(&document())?;
    let wrong = KeyMaterial::from_hex("00000000000000000000000000000000", IV)?;

    for _ in 0..3 {
        let error = DataCenter::open(&container, &wrong).unwrap_err();
        assert!(matches!(error, Error::KeyMismatch));
        assert_eq!(error.stage(), Stage::Framing);
    }

    Ok(())
}

#[test]
fn inspector_sees_every_buffer() -> Result<()> {
    let container = Repacker::new(keys()?, template()).repack(&document())?;

    let mut seen = Vec::new();
    DataCenter::open_with(&container, &keys()?, &mut |buffer: Buffer, data: &[u8]| {
        seen.push((buffer, data.len()))
    })?;

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], (Buffer::Original, container.len()));
    assert_eq!(seen[1], (Buffer::Decrypted, container.len()));
    assert_eq!(seen[2].0, Buffer::Decompressed);

    Ok(())
}

#[test]
fn garbage_tables() -> Result<()> {
    let container = crypto::seal(
        FramingHeader::default(),
        b"definitely not a table stream",
        &keys()?,
        Compression::default(),
    )?;

    let error = DataCenter::open(&container, &keys()?).unwrap_err();
    assert!(matches!(error, Error::MalformedTable(_)));
    assert_eq!(error.stage(), Stage::Table);

    Ok(())
}

#[traced_test]
#[test]
fn unpack_then_repack_from_files() -> Result<()> {
    let original = Repacker::new(keys()?, template()).repack(&document())?;

    let dir = tempfile::tempdir()?;
    export::write_document(
        dir.path(),
        &partition(&DataCenter::open(&original, &keys()?)?)?,
        false,
    )?;

    assert!(dir.path().join("Item.json").is_file());
    assert!(dir.path().join("Empty.json").is_file());
    for i in 0..3 {
        assert!(dir.path().join(format!("Skill/Skill-{i}.json")).is_file());
    }

    let edited = export::read_document(dir.path())?;
    let repacked = Repacker::from_container(&original, keys()?)?.repack(&edited)?;
    let decoded = partition(&DataCenter::open(&repacked, &keys()?)?)?;
    assert_eq!(decoded, document());
    assert_eq!(
        decoded.names().collect::<Vec<_>>(),
        vec!["Skill", "Item", "Empty"]
    );

    Ok(())
}
