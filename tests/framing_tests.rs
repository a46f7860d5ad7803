use protoframe::*;
use proptest::prelude::*;

/// `{ id: u8, name: pstring(varint), tags: u16[u8] }`
fn packet_type() -> CompiledType {
    Protocol::new()
        .with_type(
            "packet",
            TypeNode::container([
                Field::new("id", Primitive::U8),
                Field::new("name", TypeNode::pstring(Primitive::VarInt.into())),
                Field::new(
                    "tags",
                    TypeNode::prefixed_array(Primitive::U16.into(), Primitive::U8.into()),
                ),
            ]),
        )
        .compile("packet")
        .unwrap()
}

fn packet(id: u8, name: &str, tags: &[u16]) -> Value {
    let tags: Vec<Value> = tags.iter().map(|t| Value::from(*t)).collect();
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("tags", tags)
        .into()
}

fn feed(parser: &mut impl ChunkParser, chunk: &[u8]) -> Result<Vec<Packet>> {
    let mut out = Vec::new();
    parser.transform(chunk, |p| {
        out.push(p);
        Ok(())
    })?;
    Ok(out)
}

proptest! {
    #[test]
    fn split_packet_yields_one_packet(
        id in any::<u8>(),
        name in "[a-z]{0,40}",
        tags in proptest::collection::vec(any::<u16>(), 0..16),
        split in any::<prop::sample::Index>(),
    ) {
        let value = packet(id, &name, &tags);
        let bytes = Serializer::new(packet_type()).serialize(&value).unwrap();
        let k = 1 + split.index(bytes.len() - 1);

        let mut whole = Parser::new(packet_type());
        let expected = feed(&mut whole, &bytes).unwrap();
        prop_assert_eq!(expected.len(), 1);

        let mut parser = Parser::new(packet_type());
        prop_assert!(feed(&mut parser, &bytes[..k]).unwrap().is_empty());
        let packets = feed(&mut parser, &bytes[k..]).unwrap();
        prop_assert_eq!(&packets, &expected);
        prop_assert_eq!(packets[0].metadata.size, bytes.len());
        prop_assert_eq!(parser.buffered(), 0);
    }
}

#[test]
fn back_to_back_packets_in_one_chunk() {
    let serializer = Serializer::new(packet_type());
    let first = packet(1, "one", &[1]);
    let second = packet(2, "two", &[2, 3]);
    let mut bytes = serializer.serialize(&first).unwrap();
    bytes.extend(serializer.serialize(&second).unwrap());

    let mut parser = Parser::new(packet_type());
    let packets = feed(&mut parser, &bytes).unwrap();
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].data, first);
    assert_eq!(packets[1].data, second);
    assert_eq!(parser.buffered(), 0);
}

#[test]
fn byte_at_a_time_delivery() {
    let value = packet(42, "drip", &[7, 8, 9]);
    let bytes = Serializer::new(packet_type()).serialize(&value).unwrap();
    let mut parser = Parser::new(packet_type());
    let mut packets = Vec::new();
    for b in &bytes {
        packets.extend(feed(&mut parser, std::slice::from_ref(b)).unwrap());
    }
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].data, value);
}

#[test]
fn corrupt_packet_discards_buffer_and_resyncs() {
    let serializer = Serializer::new(packet_type());
    let mut parser = Parser::new(packet_type());

    // name of length 2 holding invalid utf-8, followed by part of a good packet
    let mut corrupt = vec![1, 2, 0xff, 0xfe, 0];
    corrupt.extend_from_slice(&[3]);
    let err = feed(&mut parser, &corrupt).unwrap_err();
    match err {
        Error::Discarded { buffer, source } => {
            assert_eq!(buffer, corrupt);
            assert!(matches!(*source, Error::Decode { .. }));
        }
        other => panic!("expected Discarded, got {other:?}"),
    }
    assert_eq!(parser.buffered(), 0);

    let good = packet(3, "ok", &[]);
    let packets = feed(&mut parser, &serializer.serialize(&good).unwrap()).unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].data, good);
}

#[test]
fn packets_before_corruption_are_still_emitted() {
    let serializer = Serializer::new(packet_type());
    let good = packet(9, "fine", &[1]);
    let mut bytes = serializer.serialize(&good).unwrap();
    bytes.extend_from_slice(&[1, 1, 0x80, 0]);

    let mut parser = Parser::new(packet_type());
    let mut emitted = Vec::new();
    let result = parser.transform(&bytes, |p| {
        emitted.push(p);
        Ok(())
    });
    assert!(matches!(result, Err(Error::Discarded { .. })));
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].data, good);
}

#[test]
fn serializer_error_produces_no_chunk() {
    let serializer = Serializer::new(packet_type());
    let bad: Value = Record::new().with("id", 1u8).with("name", 5u8).into();
    let err = serializer.serialize(&bad).unwrap_err();
    assert!(matches!(err, Error::Unserializable { ref packet, .. } if **packet == bad));

    // the serializer is still usable afterwards
    assert!(serializer.serialize(&packet(1, "x", &[])).is_ok());
}

#[test]
fn full_packet_parser_decodes_each_chunk_alone() {
    let serializer = Serializer::new(packet_type());
    let a = packet(1, "a", &[]);
    let b = packet(2, "b", &[5]);
    let mut parser = FullPacketParser::new(packet_type());

    let first = feed(&mut parser, &serializer.serialize(&a).unwrap()).unwrap();
    let second = feed(&mut parser, &serializer.serialize(&b).unwrap()).unwrap();
    assert_eq!(first[0].data, a);
    assert_eq!(second[0].data, b);
    assert_eq!(parser.buffered(), 0);
}

#[test]
fn full_packet_parser_fails_on_short_chunk() {
    let bytes = Serializer::new(packet_type())
        .serialize(&packet(1, "abc", &[1]))
        .unwrap();
    let mut parser = FullPacketParser::new(packet_type());
    let err = feed(&mut parser, &bytes[..bytes.len() - 1]).unwrap_err();
    assert!(err.is_partial_read());
}

#[test]
fn emit_error_stops_the_step() {
    let serializer = Serializer::new(packet_type());
    let mut bytes = serializer.serialize(&packet(1, "a", &[])).unwrap();
    bytes.extend(serializer.serialize(&packet(2, "b", &[])).unwrap());

    let mut parser = Parser::new(packet_type());
    let mut calls = 0;
    let result = parser.transform(&bytes, |_| {
        calls += 1;
        Err(Error::decode("consumer gave up"))
    });
    assert!(result.is_err());
    assert_eq!(calls, 1);
    // the second packet is still buffered for the next step
    assert!(parser.buffered() > 0);
}

#[test]
fn pull_api_decodes_one_packet_at_a_time() {
    let serializer = Serializer::new(packet_type());
    let mut parser = Parser::new(packet_type());
    parser.feed(&serializer.serialize(&packet(1, "a", &[])).unwrap());
    parser.feed(&serializer.serialize(&packet(2, "b", &[])).unwrap());

    let first = parser.next_packet().unwrap().unwrap();
    assert_eq!(first.data.as_record().unwrap().get("id"), Some(&Value::from(1u8)));
    assert!(parser.buffered() > 0);
    assert!(parser.next_packet().unwrap().is_some());
    assert!(parser.next_packet().unwrap().is_none());
}

#[test]
fn random_chunking_matches_whole_stream() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let serializer = Serializer::new(packet_type());
    let values: Vec<Value> = (0..200u32)
        .map(|i| packet(i as u8, &"n".repeat((i % 37) as usize), &[i as u16; 3]))
        .collect();
    let mut bytes = Vec::new();
    for value in &values {
        serializer.serialize_into(value, &mut bytes).unwrap();
    }

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut parser = Parser::new(packet_type());
    let mut decoded = Vec::new();
    let mut rest = &bytes[..];
    while !rest.is_empty() {
        let n = rng.gen_range(1..=rest.len().min(64));
        let (chunk, tail) = rest.split_at(n);
        decoded.extend(feed(&mut parser, chunk).unwrap().into_iter().map(|p| p.data));
        rest = tail;
    }
    assert_eq!(decoded, values);
    assert_eq!(parser.buffered(), 0);
}
