use protoframe::*;
use std::sync::Arc;
use std::thread;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn compiled_types_are_shareable() {
    assert_send_sync::<CompiledType>();
    assert_send_sync::<Serializer>();
    assert_send_sync::<FullPacketParser>();
}

#[test]
fn one_compiled_type_drives_parsers_on_many_threads() {
    let compiled = Arc::new(
        Protocol::new()
            .compiler()
            .compile(&TypeNode::container([
                Field::new("worker", Primitive::U8),
                Field::new("n", Primitive::U32),
            ]))
            .unwrap(),
    );

    let handles: Vec<_> = (0..8u8)
        .map(|worker| {
            let compiled = Arc::clone(&compiled);
            thread::spawn(move || {
                let serializer = Serializer::new((*compiled).clone());
                let mut parser = Parser::new((*compiled).clone());
                let mut bytes = Vec::new();
                for n in 0..100u32 {
                    let value: Value = Record::new().with("worker", worker).with("n", n).into();
                    serializer.serialize_into(&value, &mut bytes).unwrap();
                }
                let mut seen = Vec::new();
                for chunk in bytes.chunks(3 + worker as usize) {
                    parser
                        .transform(chunk, |p| {
                            seen.push(p.data);
                            Ok(())
                        })
                        .unwrap();
                }
                (worker, seen)
            })
        })
        .collect();

    for handle in handles {
        let (worker, seen) = handle.join().unwrap();
        assert_eq!(seen.len(), 100);
        for (n, value) in seen.iter().enumerate() {
            let record = value.as_record().unwrap();
            assert_eq!(record.get("worker"), Some(&Value::from(worker)));
            assert_eq!(record.get("n"), Some(&Value::from(n as u32)));
        }
    }
}
