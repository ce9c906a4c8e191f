use criterion::{criterion_group, criterion_main, Criterion};
use lexvar_core::tokenizer::{Language, LanguageResources, NormalizerConfig, TextNormalizer};

const TEXT: &str = "O mercado de trabalho brasileiro apresentou, no último trimestre, uma recuperação \
    gradual da ocupação formal, com destaque para os setores de serviços e comércio. A taxa de \
    desocupação recuou para 7,8%, enquanto o rendimento médio real permaneceu estável nas regiões \
    metropolitanas. As políticas públicas de qualificação profissional seguem concentradas nos jovens.";

fn bench_normalize(c: &mut Criterion) {
    let normalizer = TextNormalizer::new(LanguageResources::embedded(Language::Portuguese).expect("resources"));
    let text = TEXT.repeat(20);
    let tokens = NormalizerConfig::default();
    let shingles = NormalizerConfig { emit_shingles: true, ..Default::default() };
    c.bench_function("normalize_tokens", |b| b.iter(|| normalizer.normalize(&text, &tokens)));
    c.bench_function("normalize_shingles", |b| b.iter(|| normalizer.normalize(&text, &shingles)));
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
