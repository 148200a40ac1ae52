use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shell_gateway::mcp::shell_tool::parse_arguments;
use shell_gateway::tools::{AllowList, CommandExecutor, CommandRequest, CommandValidator, ExecutionGateway};
use tokio::runtime::Runtime;

fn bench_validate(c: &mut Criterion) {
    let validator = CommandValidator::new(AllowList::parse(
        "ls,cat,grep,find,head,tail,wc,sort,uniq,echo,pwd,git",
    ));

    let cases: Vec<(&str, Vec<String>)> = vec![
        ("allowed", vec!["grep".into(), "-rn".into(), "pattern".into(), "src".into()]),
        ("not_allowed", vec!["rm".into(), "-rf".into(), "/".into()]),
        ("operators", vec!["cat".into(), "a".into(), "|".into(), "sh".into()]),
        ("long_args", (0..256).map(|i| format!("argument-{}", i)).collect()),
    ];

    let mut group = c.benchmark_group("validate");
    for (name, argv) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), argv, |b, argv| {
            b.iter(|| validator.validate(black_box(argv.as_slice())))
        });
    }
    group.finish();
}

fn bench_parse_arguments(c: &mut Criterion) {
    let arguments = serde_json::json!({
        "command": ["grep", "-n", "needle"],
        "directory": "/tmp",
        "stdin": "haystack\nneedle\n",
        "timeout": 5
    });

    c.bench_function("parse_tool_arguments", |b| {
        b.iter(|| parse_arguments(black_box(&arguments)))
    });
}

#[cfg(unix)]
fn bench_gateway_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::TempDir::new().unwrap();
    let gateway: ExecutionGateway<CommandExecutor> = ExecutionGateway::new(AllowList::parse("true"));
    let request = CommandRequest::new(["true"], dir.path().to_str().unwrap());

    // Dominated by process spawn; tracks regressions in the surrounding plumbing
    c.bench_function("gateway_roundtrip_true", |b| {
        b.iter(|| rt.block_on(gateway.handle(black_box(&request))))
    });
}

#[cfg(not(unix))]
fn bench_gateway_roundtrip(_c: &mut Criterion) {
    println!("Skipping gateway benchmark on non-unix platform");
}

criterion_group!(benches, bench_validate, bench_parse_arguments, bench_gateway_roundtrip);
criterion_main!(benches);
