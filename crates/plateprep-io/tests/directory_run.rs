//! Integration tests: run directories of PNG fixtures through the full
//! decode -> pair -> compose -> encode path.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, Rgb, RgbImage};
use plateprep_io::{DirectoryPipeline, FileReport, RunConfig};
use plateprep_pipeline::{
    ColorNormalizer, Outcome, OutcomeTally, PerceptualRecall, PipelineConfig, Selection,
};

struct Fixture {
    input: tempfile::TempDir,
    output: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        }
    }

    fn input_path(&self, name: &str) -> PathBuf {
        self.input.path().join(name)
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.output.path().join(name)
    }

    fn config(&self, selection: Selection) -> RunConfig {
        RunConfig {
            pipeline: PipelineConfig {
                canvas_size: 100,
                minimum_quality: 0.1,
                selection,
                ..PipelineConfig::default()
            },
            output_dir: self.output.path().to_path_buf(),
            ..RunConfig::default()
        }
    }

    fn run(&self, config: &RunConfig, recall: &mut PerceptualRecall) -> (OutcomeTally, Vec<FileReport>) {
        config.validate().unwrap();
        let normalizer = ColorNormalizer::new();
        let mut reports = Vec::new();
        let tally = DirectoryPipeline::new(config, &normalizer).run(
            self.input.path(),
            recall,
            |report| reports.push(report.clone()),
        );
        (tally, reports)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn horizontal_plate(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, _| Rgb([(x * 200 / width) as u8, 40, 120]))
        .save(path)
        .unwrap();
}

#[allow(clippy::cast_possible_truncation)]
fn vertical_plate(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |_, y| Rgb([30, (y * 200 / height) as u8, 60]))
        .save(path)
        .unwrap();
}

fn solid_mask(path: &Path, width: u32, height: u32, level: u8) {
    GrayImage::from_pixel(width, height, Luma([level]))
        .save(path)
        .unwrap();
}

fn cmyk_plate(path: &Path, width: u32, height: u32, ink: [u8; 4]) {
    use tiff::encoder::{TiffEncoder, colortype};

    let samples: Vec<u8> = std::iter::repeat_n(ink, (width * height) as usize)
        .flatten()
        .collect();
    let mut file = std::fs::File::create(path).unwrap();
    TiffEncoder::new(&mut file)
        .unwrap()
        .write_image::<colortype::CMYK8>(width, height, &samples)
        .unwrap();
}

#[test]
fn cmyk_plate_is_converted_before_pairing() {
    let fx = Fixture::new();
    cmyk_plate(&fx.input_path("page-000001.tif"), 60, 60, [0, 255, 255, 0]);
    solid_mask(&fx.input_path("page-000002.png"), 60, 60, 255);

    let (tally, reports) = fx.run(&fx.config(Selection::MaskedOnly), &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Cmyk), 1);
    assert_eq!(tally.get(Outcome::Masked), 1);
    assert_eq!(tally.total(), 1);
    // The conversion is tallied but not reported as a file outcome.
    assert_eq!(reports.len(), 1);

    let written = image::open(fx.output_path("page-000001.png")).unwrap();
    assert_eq!(written.color(), image::ColorType::Rgb8);
    // No profile anywhere, so the naive conversion applies.
    assert_eq!(*written.into_rgb8().get_pixel(50, 50), Rgb([255, 0, 0]));
}

#[test]
fn plate_and_mask_produce_one_masked_canvas() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 200, 200);
    solid_mask(&fx.input_path("page-000002.png"), 200, 200, 0);

    let mut recall = PerceptualRecall::new();
    let (tally, reports) = fx.run(&fx.config(Selection::MaskedOnly), &mut recall);

    assert_eq!(tally.get(Outcome::Masked), 1);
    assert_eq!(tally.total(), 1);
    assert_eq!(recall.len(), 1);
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].destination.as_deref(),
        Some(fx.output_path("page-000001.png").as_path())
    );

    let written = image::open(fx.output_path("page-000001.png")).unwrap();
    assert_eq!(written.color(), image::ColorType::Rgb8);
    let written = written.into_rgb8();
    assert_eq!(written.dimensions(), (100, 100));
    // A fully black mask leaves only the white base.
    assert_eq!(*written.get_pixel(50, 50), Rgb([255, 255, 255]));
}

#[test]
fn masked_only_skips_unmasked_plates() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 120, 80);
    vertical_plate(&fx.input_path("page-000002.png"), 120, 80);

    let (tally, reports) = fx.run(&fx.config(Selection::MaskedOnly), &mut PerceptualRecall::new());
    assert!(tally.is_empty());
    assert!(reports.is_empty());
}

#[test]
fn all_emits_unmasked_plates_including_the_last() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-1.png"), 120, 80);
    vertical_plate(&fx.input_path("page-2.png"), 80, 120);

    let (tally, _) = fx.run(&fx.config(Selection::All), &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Normal), 2);
    for name in ["page-1.png", "page-2.png"] {
        let written = image::open(fx.output_path(name)).unwrap().into_rgb8();
        assert_eq!(written.dimensions(), (100, 100), "{name}");
    }
}

#[test]
fn unmasked_only_skips_pairs() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 200, 200);
    solid_mask(&fx.input_path("page-000002.png"), 200, 200, 255);
    vertical_plate(&fx.input_path("page-000003.png"), 150, 100);

    let (tally, reports) = fx.run(&fx.config(Selection::UnmaskedOnly), &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Masked), 0);
    assert_eq!(tally.get(Outcome::Normal), 1);
    assert_eq!(reports[0].source, fx.input_path("page-000003.png"));
    assert!(!fx.output_path("page-000001.png").exists());
}

#[test]
fn numeric_order_pairs_plate_with_its_mask() {
    let fx = Fixture::new();
    // Lexicographic order would put page-10 before page-9.
    horizontal_plate(&fx.input_path("page-9.png"), 60, 60);
    solid_mask(&fx.input_path("page-10.png"), 60, 60, 255);

    let (tally, _) = fx.run(&fx.config(Selection::MaskedOnly), &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Masked), 1);
}

#[test]
fn repeated_artwork_is_a_duplicate() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 120, 120);
    horizontal_plate(&fx.input_path("page-000002.png"), 120, 120);

    let mut recall = PerceptualRecall::new();
    let (tally, _) = fx.run(&fx.config(Selection::All), &mut recall);
    assert_eq!(tally.get(Outcome::Normal), 1);
    assert_eq!(tally.get(Outcome::Duplicate), 1);
    assert_eq!(recall.len(), 1);
    assert!(!fx.output_path("page-000002.png").exists());
}

#[test]
fn shared_recall_spans_directories() {
    let first = Fixture::new();
    let second = Fixture::new();
    horizontal_plate(&first.input_path("a-1.png"), 100, 100);
    horizontal_plate(&second.input_path("b-1.png"), 100, 100);

    let mut recall = PerceptualRecall::new();
    let (tally, _) = first.run(&first.config(Selection::All), &mut recall);
    assert_eq!(tally.get(Outcome::Normal), 1);
    let (tally, _) = second.run(&second.config(Selection::All), &mut recall);
    assert_eq!(tally.get(Outcome::Duplicate), 1);
}

#[test]
fn rejected_files_do_not_break_pairs() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 200, 200);
    std::fs::write(fx.input_path("page-000001.params"), b"x").unwrap();
    std::fs::write(fx.input_path("page-000001.ccitt"), b"x").unwrap();
    solid_mask(&fx.input_path("page-000002.png"), 5, 5, 0);
    std::fs::write(fx.input_path("page-000003"), b"").unwrap();
    solid_mask(&fx.input_path("page-000004.png"), 200, 200, 255);

    let (tally, reports) = fx.run(&fx.config(Selection::MaskedOnly), &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Unsupported), 2);
    assert_eq!(tally.get(Outcome::Small), 1);
    assert_eq!(tally.get(Outcome::Unknown), 1);
    assert_eq!(tally.get(Outcome::Masked), 1);
    assert!(reports.iter().filter(|r| r.outcome != Outcome::Masked).all(|r| r.destination.is_none()));
}

#[test]
fn undecodable_content_is_unsupported() {
    let fx = Fixture::new();
    std::fs::write(fx.input_path("page-000001.png"), b"not a png").unwrap();

    let (tally, _) = fx.run(&fx.config(Selection::All), &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Unsupported), 1);
}

#[test]
fn keep_existing_leaves_output_alone() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 120, 120);
    std::fs::write(fx.output_path("page-000001.png"), b"keep me").unwrap();

    let mut config = fx.config(Selection::All);
    config.pipeline.keep_existing = true;
    let (tally, _) = fx.run(&config, &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Skipped), 1);
    assert_eq!(std::fs::read(fx.output_path("page-000001.png")).unwrap(), b"keep me");
}

#[test]
fn find_duplicates_writes_nothing() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 120, 120);
    horizontal_plate(&fx.input_path("page-000002.png"), 120, 120);
    vertical_plate(&fx.input_path("page-000003.png"), 120, 120);

    let mut config = fx.config(Selection::All);
    config.pipeline.find_duplicates = true;
    let (tally, reports) = fx.run(&config, &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Normal), 2);
    assert_eq!(tally.get(Outcome::Duplicate), 1);
    let duplicate = reports.iter().find(|r| r.outcome == Outcome::Duplicate).unwrap();
    assert_eq!(duplicate.source, fx.input_path("page-000002.png"));
    assert_eq!(std::fs::read_dir(fx.output.path()).unwrap().count(), 0);
}

#[test]
fn transparent_padding() {
    let fx = Fixture::new();
    horizontal_plate(&fx.input_path("page-000001.png"), 200, 100);

    let mut config = fx.config(Selection::All);
    config.pipeline.transparent = true;
    let (tally, _) = fx.run(&config, &mut PerceptualRecall::new());
    assert_eq!(tally.get(Outcome::Normal), 1);

    let written = image::open(fx.output_path("page-000001.png")).unwrap().into_rgba8();
    assert_eq!(written.get_pixel(50, 0).0[3], 0);
    assert_eq!(written.get_pixel(50, 50).0[3], 255);
}
