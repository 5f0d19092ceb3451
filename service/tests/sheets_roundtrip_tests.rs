//! Spreadsheet round-trip tests: metadata -> workbook -> metadata

mod helpers;

use helpers::metadata_fixtures::*;
use indexmap::{IndexMap, IndexSet};
use mihcsme_core::{
    AnnotationRecord, ConditionDefinition, ConditionKind, GroupedInformation, MetadataDocument,
    MetadataSet, MihcsmeError, ReferenceSheet,
};
use mihcsme_service::config::{ParserConfig, WriterConfig};
use mihcsme_service::sheets::{MetadataSheetsGenerator, MetadataSheetsParser};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

fn roundtrip(metadata: &MetadataSet) -> MetadataSet {
    let bytes = MetadataSheetsGenerator::new().generate_buffer(metadata).unwrap();
    let parsed = MetadataSheetsParser::new().parse_bytes(bytes).unwrap();
    assert!(parsed.warnings.is_empty(), "unexpected warnings: {:?}", parsed.warnings);
    parsed.metadata
}

/// Well annotations survive an in-memory round trip
#[test]
fn test_plate_metadata_roundtrip() {
    let metadata = plate_metadata();
    assert_eq!(roundtrip(&metadata), metadata);
}

/// Plate names and reference sheets survive a round trip
#[test]
fn test_full_metadata_roundtrip() {
    let metadata = full_metadata();
    let restored = roundtrip(&metadata);

    assert_eq!(restored, metadata);
    assert!(restored.uses_plate_names());
    assert_eq!(restored.reference_sheets()[0].entries.len(), 2);
}

/// Round trip through a file on disk
#[test]
fn test_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("roundtrip.xlsx");
    let metadata = full_metadata();

    MetadataSheetsGenerator::new().generate_file(&metadata, &path).unwrap();
    assert!(path.exists());

    let parsed = MetadataSheetsParser::new().parse_file(&path).unwrap();
    assert_eq!(parsed.metadata, metadata);
}

/// Writer styling options do not change the content
#[test]
fn test_roundtrip_without_validation_or_frozen_headers() {
    let generator = MetadataSheetsGenerator::with_config(WriterConfig {
        freeze_headers: false,
        add_validation: false,
        header_background: "#FFEB9C".into(),
        ..WriterConfig::default()
    });
    let metadata = plate_metadata();
    let bytes = generator.generate_buffer(&metadata).unwrap();
    let parsed = MetadataSheetsParser::new().parse_bytes(bytes).unwrap();
    assert_eq!(parsed.metadata, metadata);
}

/// Sample tokens are written to a Sample column and read back
#[test]
fn test_sample_identifier_roundtrip() {
    let metadata = plate_metadata()
        .with_annotations(vec![
            AnnotationRecord::sample("S-1")
                .on_plate("Plate1")
                .with_value("CellLine", "HeLa"),
            AnnotationRecord::sample("S-2")
                .on_plate("Plate1")
                .with_value("Temperature", 4),
        ])
        .unwrap();

    let restored = roundtrip(&metadata);
    assert!(restored.uses_sample_identifiers());
    assert_eq!(restored, metadata);
}

/// Metadata without annotations still has its definitions after a round trip
#[test]
fn test_empty_annotations_roundtrip() {
    let metadata = plate_metadata().with_annotations(Vec::new()).unwrap();
    let restored = roundtrip(&metadata);

    assert_eq!(restored.annotation_count(), 0);
    assert_eq!(restored.conditions().len(), 3);
    assert_eq!(restored, metadata);
}

/// A vocabulary header that reads like a comment row is rejected up front
#[test]
fn test_comment_like_reference_header_is_rejected() {
    let mut document = full_metadata().to_document();
    document.reference_sheets = vec![ReferenceSheet {
        name: "_CellLines".into(),
        key_header: "#Code".into(),
        value_header: "Cellosaurus".into(),
        entries: IndexMap::from([("HeLa".to_string(), "CVCL_0030".to_string())]),
    }];

    let err = MetadataSet::from_document(document).unwrap_err();
    assert_eq!(err.issues()[0].path, "ReferenceSheets[_CellLines].#Code");
}

/// A custom comment prefix is honoured by writer and parser alike
#[test]
fn test_custom_comment_prefix() {
    let prefix = "~";
    let parser = MetadataSheetsParser::with_config(ParserConfig {
        comment_prefix: prefix.into(),
        ..ParserConfig::default()
    });
    let generator = MetadataSheetsGenerator::new().with_comment_prefix(prefix);

    let metadata = full_metadata();
    let bytes = generator.generate_buffer(&metadata).unwrap();
    assert_eq!(parser.parse_bytes(bytes).unwrap().metadata, metadata);

    let mut document = metadata.to_document();
    document.reference_sheets[0].entries.insert("~HEK".into(), "CVCL_0045".into());
    let hidden = MetadataSet::from_document(document).unwrap();
    let err = generator.generate_buffer(&hidden).unwrap_err();
    let MihcsmeError::Validation(issues) = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(issues.issues()[0].path, "ReferenceSheets[_CellLines].~HEK");
    // The default prefix accepts it.
    assert!(MetadataSheetsGenerator::new().generate_buffer(&hidden).is_ok());
}

const LABELS: [&str; 4] = ["HeLa", "U2OS", "HEK 293", "MCF-7"];
const NUMERIC_TEXT: [&str; 6] = ["037", "1e3", "12.50", "-0", "0x1F", "1,5"];
const PLATES: [&str; 3] = ["Plate1", "Plate_2", "P-3"];

fn text_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        prop::sample::select(NUMERIC_TEXT.to_vec()).prop_map(String::from),
        "[a-zA-Z][a-zA-Z0-9 %.,]{0,11}[a-zA-Z0-9]",
    ]
    .boxed()
}

fn definitions_strategy() -> impl Strategy<Value = Vec<ConditionDefinition>> {
    (
        -500.0_f64..500.0,
        0.0_f64..1000.0,
        prop::option::of(prop::sample::select(vec!["µM", "°C", "mg/ml"])),
        prop::option::of("[A-Z][a-z]{2,10}( [a-z]{2,8}){0,3}"),
        prop::sample::subsequence(LABELS.to_vec(), 1..=LABELS.len()),
    )
        .prop_map(|(minimum, span, unit, description, labels)| {
            let mut dose = ConditionDefinition::new("Dose", ConditionKind::Numeric)
                .with_range(Some(minimum), Some(minimum + span));
            if let Some(unit) = unit {
                dose = dose.with_unit(unit);
            }
            if let Some(description) = description {
                dose = dose.with_description(description);
            }
            vec![
                dose,
                ConditionDefinition::new("Label", ConditionKind::Categorical).with_allowed_values(labels),
                ConditionDefinition::new("Note", ConditionKind::Text),
            ]
        })
}

fn grouped_strategy() -> impl Strategy<Value = GroupedInformation> {
    prop::collection::vec(
        ("[A-Z][a-z]{1,8}", "[A-Z][a-z]{1,8}( [a-z]{1,6})?", text_strategy()),
        0..5,
    )
    .prop_map(|rows| rows.into_iter().collect())
}

fn reference_strategy() -> impl Strategy<Value = Vec<ReferenceSheet>> {
    prop::collection::vec(
        (
            "_[A-Za-z]{1,10}",
            "[A-Z][a-z]{1,8}",
            "[A-Z][a-z]{1,8}",
            prop::collection::vec(("[A-Za-z][A-Za-z0-9]{0,6}", text_strategy()), 1..5),
        ),
        0..3,
    )
    .prop_map(|sheets| {
        let mut names = IndexSet::new();
        sheets
            .into_iter()
            .filter(|(name, ..)| names.insert(name.to_lowercase()))
            .map(|(name, key_header, value_header, entries)| ReferenceSheet {
                name,
                key_header,
                value_header,
                entries: entries.into_iter().collect(),
            })
            .collect()
    })
}

fn record_strategy(
    samples: bool,
    plates: bool,
    minimum: f64,
    maximum: f64,
    labels: Vec<String>,
) -> impl Strategy<Value = AnnotationRecord> {
    let key = if samples {
        "S-[A-Za-z0-9_.]{1,6}".boxed()
    } else {
        (0_u8..16, 1_u32..=24)
            .prop_map(|(row, column)| format!("{}{column}", char::from(b'A' + row)))
            .boxed()
    };
    let plate = if plates {
        prop::sample::select(PLATES.to_vec()).prop_map(Some).boxed()
    } else {
        Just(None).boxed()
    };
    let dose = prop_oneof![
        Just(minimum),
        Just(maximum),
        (0.0_f64..=1.0).prop_map(move |t| (minimum + t * (maximum - minimum)).clamp(minimum, maximum)),
    ];
    (
        key,
        plate,
        prop::option::of(dose),
        prop::option::of(prop::sample::select(labels)),
        prop::option::of(text_strategy()),
    )
        .prop_map(move |(key, plate, dose, label, note)| {
            let mut record = if samples {
                AnnotationRecord::sample(key)
            } else {
                AnnotationRecord::well(key)
            };
            if let Some(plate) = plate {
                record = record.on_plate(plate);
            }
            if let Some(dose) = dose {
                record = record.with_value("Dose", dose);
            }
            if let Some(label) = label {
                record = record.with_value("Label", label);
            }
            if let Some(note) = note {
                record = record.with_value("Note", note);
            }
            record
        })
}

fn document_strategy() -> impl Strategy<Value = MetadataDocument> {
    (
        definitions_strategy(),
        any::<bool>(),
        any::<bool>(),
        grouped_strategy(),
        grouped_strategy(),
        reference_strategy(),
    )
        .prop_flat_map(|(definitions, samples, plates, study, assay, reference_sheets)| {
            let minimum = definitions[0].minimum.unwrap_or_default();
            let maximum = definitions[0].maximum.unwrap_or_default();
            let labels = definitions[1].allowed_values.clone();
            let records = prop::collection::vec(
                record_strategy(samples, plates, minimum, maximum, labels),
                0..16,
            );
            (Just(definitions), Just(study), Just(assay), Just(reference_sheets), records)
        })
        .prop_map(|(definitions, study, assay, reference_sheets, records)| {
            let mut seen = IndexSet::new();
            MetadataDocument {
                study_information: study,
                assay_information: assay,
                assay_conditions: definitions,
                annotations: records
                    .into_iter()
                    .filter(|r| seen.insert(r.parse_id().unwrap()))
                    .collect(),
                reference_sheets,
                ..plate_document()
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any valid metadata set survives a workbook round trip
    #[test]
    fn prop_metadata_roundtrip(document in document_strategy()) {
        let metadata = MetadataSet::from_document(document).unwrap();

        let restored = roundtrip(&metadata);
        prop_assert_eq!(&restored, &metadata);
        prop_assert_eq!(restored.to_document(), metadata.to_document());
    }
}
