//! Benchmarks for template detection and mode classification.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use run_switcher::classifier::{classify, ClassifierInputs};
use run_switcher::core::{FetchNode, FetchPhase, NodePhases};
use run_switcher::template::{classify_template_format, TemplateSource, TemplateText};
use run_switcher::testing::fixtures;

fn format_benchmark(c: &mut Criterion) {
    c.bench_function("classify_template_format/legacy", |b| {
        b.iter(|| classify_template_format(black_box(fixtures::LEGACY_TEMPLATE)))
    });
    c.bench_function("classify_template_format/next_gen", |b| {
        b.iter(|| classify_template_format(black_box(fixtures::NEXT_GEN_TEMPLATE)))
    });
}

fn classify_benchmark(c: &mut Criterion) {
    let template = TemplateText::new(fixtures::NEXT_GEN_TEMPLATE, TemplateSource::CompiledTemplate);
    let phases = NodePhases::new()
        .with(FetchNode::Pipeline, FetchPhase::Ready)
        .with(FetchNode::PipelineVersion, FetchPhase::Ready)
        .with(FetchNode::CompiledTemplate, FetchPhase::Ready);

    c.bench_function("classify/settled", |b| {
        b.iter(|| {
            classify(black_box(&ClassifierInputs {
                phases,
                failure: None,
                template: &template,
                next_gen_enabled: true,
                effective_run_id: None,
                recurring_run_id: None,
            }))
        })
    });
}

criterion_group!(benches, format_benchmark, classify_benchmark);
criterion_main!(benches);
