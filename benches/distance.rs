use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imagedex::catalogue::{Catalogue, ImageRecord};
use imagedex::fingerprint::{
    Fingerprint, FingerprintService, FingerprintSet, PerceptualService,
};
use imagedex::matcher::Matcher;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn lcg_fingerprint(state: &mut u64) -> Fingerprint {
    *state = state
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    Fingerprint::from_bytes(state.to_be_bytes().to_vec())
}

fn synthetic_set(state: &mut u64) -> FingerprintSet {
    FingerprintSet {
        average: lcg_fingerprint(state),
        perceptual: lcg_fingerprint(state),
        difference: lcg_fingerprint(state),
    }
}

fn synthetic_catalogue(count: usize) -> Catalogue {
    let mut state = 0x9e37_79b9_7f4a_7c15_u64;
    let mut catalogue = Catalogue::new(PathBuf::from("/photos"));
    for i in 0..count {
        let set = synthetic_set(&mut state);
        catalogue.records.insert(
            format!("img_{i:05}.jpg"),
            ImageRecord {
                width: Some(640),
                height: Some(480),
                created: Some(0.0),
                modified: Some(0.0),
                a_hash: Some(set.average),
                p_hash: Some(set.perceptual),
                d_hash: Some(set.difference),
            },
        );
    }
    catalogue
}

// 1. Raw Hamming distance
fn bench_distance(c: &mut Criterion) {
    let a = Fingerprint::from_bytes(vec![0xa5; 8]);
    let b = Fingerprint::from_bytes(vec![0x5a; 8]);

    c.bench_function("hamming_64_bit", |bench| {
        bench.iter(|| black_box(a.distance(black_box(&b)).unwrap()))
    });
}

// 2. All three kinds at once, as the matcher computes them per candidate
fn bench_set_distances(c: &mut Criterion) {
    let mut state = 17;
    let probe = synthetic_set(&mut state);
    let candidate = synthetic_set(&mut state);

    c.bench_function("set_distances", |bench| {
        bench.iter(|| black_box(probe.distances(black_box(&candidate)).unwrap()))
    });
}

// 3. Full match over catalogues of increasing size
fn bench_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher");

    for count in [100, 1_000, 10_000] {
        let catalogue = synthetic_catalogue(count);
        let matcher = Matcher::new(&catalogue).unwrap();
        let mut state = 7;
        let probe = synthetic_set(&mut state);

        group.bench_with_input(format!("match_{}_records", count), &probe, |bench, probe| {
            bench.iter(|| {
                let result = matcher
                    .match_fingerprints(Path::new("q.jpg"), probe)
                    .unwrap();
                black_box(result);
            })
        });
    }
    group.finish();
}

// 4. Decode plus all three hashes for one image
fn bench_measure(c: &mut Criterion) {
    // Create a 256x256 image (gradient)
    let mut img = image::RgbImage::new(256, 256);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgb([x as u8, y as u8, 128u8]);
    }

    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("bench_img.png");
    img.save(&file_path).expect("Failed to save bench image");

    let service = PerceptualService::new();
    c.bench_function("measure_256px_png", |bench| {
        bench.iter(|| {
            let measurement = service.measure(&file_path).unwrap();
            black_box(measurement);
        })
    });
}

criterion_group!(
    benches,
    bench_distance,
    bench_set_distances,
    bench_match,
    bench_measure
);
criterion_main!(benches);
