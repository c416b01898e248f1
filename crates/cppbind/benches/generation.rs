use std::{fmt::Write, hint::black_box, path::Path};

use cppbind::{
    config::PackageConfig,
    declarations::{Access, BaseRef, DeclKind, DeclarationModel, DeclarationNode, Param, Virtuality},
    generate,
};
use criterion::{Criterion, criterion_group, criterion_main};

/// A chain of `classes` classes per module, each deriving from the previous
/// one and overriding a virtual `Update`
fn synthetic_model(modules: usize, classes: usize) -> DeclarationModel {
    let mut nodes = Vec::new();
    for module in 0..modules {
        for index in 0..classes {
            let name = format!("M{module}C{index}");
            let mut class = DeclarationNode::new(&name, DeclKind::Class);
            class.source_file = Some(format!("src/m{module}/{name}.hpp"));
            if index > 0 {
                class.bases.push(BaseRef {
                    name: format!("M{module}C{}", index - 1),
                    access: Access::Public,
                });
            }
            nodes.push(class);

            let mut constructor =
                DeclarationNode::new(format!("{name}::{name}"), DeclKind::Constructor);
            constructor.parent = Some(name.clone());
            constructor.params = vec![Param::new("scale", "double").with_default("1.0")];
            nodes.push(constructor);

            let mut update = DeclarationNode::new(format!("{name}::Update"), DeclKind::Method);
            update.parent = Some(name.clone());
            update.return_type = Some("void".into());
            update.params = vec![Param::new("dt", "double")];
            update.virtuality = Virtuality::Virtual;
            nodes.push(update);

            for overload in ["int", "double"] {
                let mut get = DeclarationNode::new(format!("{name}::Get"), DeclKind::Method);
                get.parent = Some(name.clone());
                get.return_type = Some(overload.into());
                get.params = vec![Param::new("key", overload)];
                nodes.push(get);
            }
        }
    }
    DeclarationModel::new(nodes, Vec::new()).expect("synthetic model is valid")
}

fn synthetic_config(modules: usize) -> PackageConfig {
    let mut source = String::from("name = \"bench\"\n");
    for module in 0..modules {
        let _ = write!(
            source,
            "\n[[modules]]\nname = \"m{module}\"\nsource_locations = [\"src/m{module}\"]\n\
             classes = \"ALL\"\n"
        );
    }
    PackageConfig::from_toml_str(&source, Path::new("bench.toml")).expect("valid config")
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");

    for (modules, classes) in [(1, 20), (4, 50)] {
        let model = synthetic_model(modules, classes);
        let config = synthetic_config(modules);
        group.bench_function(format!("{modules}x{classes}"), |b| {
            b.iter(|| generate(black_box(&model), black_box(&config)).expect("generates"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_generation);
criterion_main!(benches);
