#![no_main]
use libfuzzer_sys::fuzz_target;
use protoframe::{
    ChunkParser, Field, FullPacketParser, Parser, ParserConfig, Primitive, Protocol, SwitchType,
    TypeNode,
};

fuzz_target!(|data: &[u8]| {
    let node = TypeNode::container([
        Field::new("kind", Primitive::U8),
        Field::anonymous(
            SwitchType::on("kind")
                .branch(
                    "1",
                    TypeNode::container([
                        Field::new("name", TypeNode::pstring(Primitive::VarInt.into())),
                        Field::new("extra", TypeNode::option(Primitive::Li64.into())),
                    ]),
                )
                .branch(
                    "2",
                    TypeNode::container([Field::new(
                        "name",
                        TypeNode::prefixed_array(Primitive::U16.into(), Primitive::U8.into()),
                    )]),
                ),
        ),
    ]);
    let Ok(compiled) = Protocol::new().compiler().compile(&node) else {
        return;
    };

    // the first byte picks the chunk size so splits are explored too
    let (step, rest) = match data.split_first() {
        Some((b, rest)) => (*b as usize % 16 + 1, rest),
        None => return,
    };
    let mut parser = Parser::with_config(compiled.clone(), ParserConfig::bounded(1 << 16));
    for chunk in rest.chunks(step) {
        let _ = parser.transform(chunk, |packet| {
            assert!(packet.metadata.size > 0);
            Ok(())
        });
    }
    let _ = FullPacketParser::new(compiled).transform(rest, |_| Ok(()));
});
