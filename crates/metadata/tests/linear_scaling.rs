use codeintel_code_chunker::{ChunkExtractor, ChunkerConfig, Language, SourceUnit};
use codeintel_metadata::{MetadataExtractor, ModuleImportIndex};
use std::time::{Duration, Instant};

const CHUNK_COUNTS: [usize; 4] = [10, 50, 100, 200];

fn module_with_functions(count: usize) -> String {
    let mut source = String::from("import os\nfrom json import dumps\n\n");
    for i in 0..count {
        source.push_str(&format!(
            "def func_{i}(a, b=1):\n    \"\"\"Doc {i}.\"\"\"\n    if a and b:\n        return dumps(os.getcwd())\n    return helper_{i}(a)\n\n"
        ));
    }
    source
}

struct Measurement {
    chunks: usize,
    index_nodes: usize,
    visited_per_chunk: f64,
    elapsed: Duration,
}

fn measure(count: usize) -> Measurement {
    let chunker = ChunkExtractor::new(ChunkerConfig::default()).unwrap();
    let unit = SourceUnit::new("generated.py", module_with_functions(count), Language::Python);
    let outcome = chunker.chunk_unit(&unit);
    let tree = outcome.tree.as_ref().expect("python parses");
    let extractor = MetadataExtractor::from_config(chunker.config());

    let started = Instant::now();
    let index = ModuleImportIndex::build(tree);
    let visited: usize = outcome
        .chunks
        .iter()
        .map(|chunk| {
            let extracted = extractor.extract(chunk, Some(tree), &index);
            assert!(extracted.is_complete());
            extracted.visited_nodes
        })
        .sum();
    let elapsed = started.elapsed();

    Measurement {
        chunks: outcome.chunks.len(),
        index_nodes: index.traversed_nodes(),
        visited_per_chunk: visited as f64 / outcome.chunks.len() as f64,
        elapsed,
    }
}

#[test]
fn per_chunk_work_is_constant() {
    let measurements: Vec<_> = CHUNK_COUNTS.iter().map(|&n| measure(n)).collect();

    for (measurement, &expected) in measurements.iter().zip(CHUNK_COUNTS.iter()) {
        assert_eq!(measurement.chunks, expected);
    }

    let baseline = measurements[0].visited_per_chunk;
    for measurement in &measurements {
        assert!(
            (measurement.visited_per_chunk - baseline).abs() < f64::EPSILON,
            "per-chunk visits changed from {baseline} to {} at {} chunks",
            measurement.visited_per_chunk,
            measurement.chunks
        );
    }

    // One traversal per unit: index work tracks the tree size, not chunks squared
    let small = &measurements[0];
    let large = &measurements[3];
    let growth = large.index_nodes as f64 / small.index_nodes as f64;
    assert!(growth < 21.0, "index traversal grew {growth}x for 20x chunks");
}

#[test]
#[ignore = "wall-clock measurement; run with --ignored on a quiet machine"]
fn per_chunk_time_stays_flat() {
    // warm up the parser and allocator
    let _ = measure(10);

    let small = measure(10);
    let large = measure(200);
    let per_small = small.elapsed.as_secs_f64() / small.chunks as f64;
    let per_large = large.elapsed.as_secs_f64() / large.chunks as f64;
    println!(
        "per-chunk extraction: {:.3}ms at 10 chunks, {:.3}ms at 200 chunks",
        per_small * 1e3,
        per_large * 1e3
    );
    assert!(per_large < per_small * 3.0);
}
