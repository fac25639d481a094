//! Classification performance benchmarks
//!
//! Measures the pure text-analysis path: terminal-notice detection,
//! boilerplate stripping and field extraction. No I/O.
//!
//! Run with: `cargo bench`

use botgate::classify::{QueryMode, classify};
use botgate::config::BotHandle;
use botgate::transport::InboundMessage;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn message(text: &str) -> InboundMessage {
    InboundMessage {
        id: 1,
        sender: BotHandle::from("@bench_bot"),
        text: text.to_string(),
        media: None,
    }
}

fn detail_record() -> String {
    "[#LEDER_BOT] [CONSULTA PE]\n\
     DNI: 12345678\n\
     APELLIDO PATERNO: QUISPE\n\
     APELLIDO MATERNO: MAMANI\n\
     NOMBRES: JUAN CARLOS\n\
     FECHA DE NACIMIENTO: 01/01/1990\n\
     GÉNERO: MASCULINO\n\
     DIRECCIÓN: AV. SIEMPRE VIVA 123\n\
     UBIGEO: 150101\n\
     DEPARTAMENTO: LIMA\n\
     PROVINCIA: LIMA\n\
     DISTRITO: MIRAFLORES\n\
     Estado Civil: SOLTERO\n\
     Página 1/1\n\
     Créditos : 42"
        .to_string()
}

fn listing(records: usize) -> String {
    let mut text = String::from("RENIEC NOMBRES [PREMIUM] Se encontró 500 resultados\n");
    for i in 0..records {
        text.push_str(&format!("{i}. QUISPE MAMANI, PERSONA{i} - DNI 1000{i:04}\n"));
    }
    text
}

fn bench_detail_classification(c: &mut Criterion) {
    let msg = message(&detail_record());
    c.bench_function("classify_detail_record", |b| {
        b.iter(|| classify(&msg, QueryMode::Detail));
    });
}

fn bench_terminal_notices(c: &mut Criterion) {
    let cases = vec![
        ("rate_limit", "ANTI-SPAM ACTIVADO. INTENTA DESPUÉS DE 10 SEGUNDOS"),
        ("not_found", "[⚠️] no se encontro información"),
        ("malformed", "Por favor, usa el formato correcto"),
    ];

    let mut group = c.benchmark_group("classify_terminal_notice");
    for (name, text) in cases {
        let msg = message(text);
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| classify(msg, QueryMode::Detail));
        });
    }
    group.finish();
}

fn bench_listing_passthrough(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_listing");
    for records in [10usize, 100, 500] {
        let msg = message(&listing(records));
        group.bench_with_input(BenchmarkId::from_parameter(records), &msg, |b, msg| {
            b.iter(|| classify(msg, QueryMode::NameSearch));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_detail_classification,
    bench_terminal_notices,
    bench_listing_passthrough
);
criterion_main!(benches);
