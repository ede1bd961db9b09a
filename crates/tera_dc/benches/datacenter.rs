use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn keys() -> tera_dc::KeyMaterial {
    tera_dc::KeyMaterial::from_hex(
        "00112233445566778899aabbccddeeff",
        "0f0e0d0c0b0a09080706050403020100",
    )
    .unwrap()
}

fn document(units: usize) -> tera_dc::Document {
    use tera_dc::{Node, Unit, Value};

    (0..units)
        .map(|unit| {
            let nodes = (0..16)
                .map(|i| {
                    let mut entry = Node::new();
                    entry.insert_value("value", Value::Float(i as f32 / 3.0));
                    entry.insert_value("enabled", Value::Boolean(i % 2 == 0));

                    let mut node = Node::new();
                    node.insert_value("id", Value::Integer(i));
                    node.insert_value("desc", Value::String(format!("unit {unit} node {i}")));
                    for _ in 0..8 {
                        node.push_child("Entry", entry.clone());
                    }
                    node
                })
                .collect::<Vec<_>>();
            (format!("Unit{unit}"), Unit::from(nodes))
        })
        .collect()
}

fn container() -> Vec<u8> {
    tera_dc::Repacker::new(keys(), Default::default())
        .repack(&document(64))
        .unwrap()
}

pub mod decode {
    use divan::Bencher;
    use tera_dc::{crypto, DataCenter};

    #[divan::bench]
    fn open(bencher: Bencher) {
        let keys = super::keys();
        bencher.with_inputs(super::container).bench_refs(|data| {
            divan::black_box(crypto::open(data, &keys, &mut crypto::NoInspector).unwrap());
        });
    }

    #[divan::bench]
    fn parse(bencher: Bencher) {
        let keys = super::keys();
        let tables = crypto::open(&super::container(), &keys, &mut crypto::NoInspector)
            .unwrap()
            .tables;
        bencher.bench(|| divan::black_box(DataCenter::parse(&tables).unwrap()));
    }

    #[divan::bench]
    fn partition(bencher: Bencher) {
        let dc = DataCenter::open(&super::container(), &super::keys()).unwrap();
        bencher.bench(|| divan::black_box(tera_dc::partition(&dc).unwrap()));
    }
}

pub mod encode {
    use divan::Bencher;
    use tera_dc::Repacker;

    #[divan::bench(args = [1, 16, 64])]
    fn repack(bencher: Bencher, units: usize) {
        let repacker = Repacker::new(super::keys(), Default::default());
        bencher
            .with_inputs(|| super::document(units))
            .bench_refs(|document| divan::black_box(repacker.repack(document).unwrap()));
    }
}
