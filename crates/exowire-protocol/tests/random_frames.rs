//! Randomised frame tests over every Exosphere message definition.
//!
//! A seeded RNG keeps failures reproducible.

use exowire_protocol::exosphere::{self, CLIENT_MESSAGES, SERVER_MESSAGES};
use exowire_protocol::{MessageSpec, ProtocolError, ScalarType, Schema, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 0x00E5_05F4_E2E0;
const ROUNDS: usize = 200;

fn random_value(rng: &mut StdRng, ty: ScalarType) -> Value {
    match ty {
        ScalarType::String => {
            let len = rng.random_range(0..48);
            Value::String((0..len).map(|_| rng.random::<char>()).collect())
        }
        ScalarType::U8 => Value::U8(rng.random()),
        ScalarType::U16 => Value::U16(rng.random()),
        ScalarType::U32 => Value::U32(rng.random()),
        ScalarType::U64 => Value::U64(rng.random()),
        ScalarType::I8 => Value::I8(rng.random()),
        ScalarType::I16 => Value::I16(rng.random()),
        ScalarType::I32 => Value::I32(rng.random()),
        ScalarType::I64 => Value::I64(rng.random()),
        // Any bit pattern, NaN payloads included.
        ScalarType::F32 => Value::F32(f32::from_bits(rng.random())),
        ScalarType::F64 => Value::F64(f64::from_bits(rng.random())),
    }
}

fn random_values(rng: &mut StdRng, layout: &[ScalarType]) -> Vec<Value> {
    layout.iter().map(|&ty| random_value(rng, ty)).collect()
}

fn tables() -> Vec<(&'static str, &'static [MessageSpec])> {
    vec![("server", SERVER_MESSAGES), ("client", CLIENT_MESSAGES)]
}

// =========================================================================
// Round-trips
// =========================================================================

#[test]
fn test_every_definition_round_trips() {
    let mut rng = StdRng::seed_from_u64(SEED);

    for (direction, specs) in tables() {
        let schema = Schema::from_static(specs).unwrap();
        for (tag, spec) in specs.iter().enumerate() {
            for round in 0..ROUNDS {
                let values = random_values(&mut rng, spec.layout);
                let bytes = schema.encode(spec.name, &values).unwrap();
                assert_eq!(bytes[0] as usize, tag);

                let expected_len: usize = 1 + spec
                    .layout
                    .iter()
                    .zip(&values)
                    .map(|(ty, v)| ty.size(v).unwrap())
                    .sum::<usize>();
                assert_eq!(bytes.len(), expected_len, "{direction} {} round {round}", spec.name);

                let frame = schema.decode(&bytes).unwrap();
                assert_eq!(frame.name, spec.name);

                // Re-encoding is byte-identical even for NaN floats.
                let again = schema.encode_frame(&frame).unwrap();
                assert_eq!(again, bytes, "seed {SEED:#x}: {direction} {} round {round}", spec.name);
            }
        }
    }
}

#[test]
fn test_random_frames_cross_the_codec_pair() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    let client = exosphere::client_codec().unwrap();
    let server = exosphere::server_codec().unwrap();

    for _ in 0..ROUNDS {
        let spec = CLIENT_MESSAGES[rng.random_range(0..CLIENT_MESSAGES.len())];
        let values = random_values(&mut rng, spec.layout);
        let bytes = client.encode(spec.name, &values).unwrap();
        assert_eq!(server.decode(&bytes).unwrap().name, spec.name);

        let spec = SERVER_MESSAGES[rng.random_range(0..SERVER_MESSAGES.len())];
        let values = random_values(&mut rng, spec.layout);
        let bytes = server.encode(spec.name, &values).unwrap();
        assert_eq!(client.decode(&bytes).unwrap().name, spec.name);
    }
}

// =========================================================================
// Hostile input
// =========================================================================

#[test]
fn test_truncating_random_frames_never_panics() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 2);
    let schema = Schema::from_static(SERVER_MESSAGES).unwrap();

    for _ in 0..ROUNDS {
        let spec = SERVER_MESSAGES[rng.random_range(0..SERVER_MESSAGES.len())];
        let bytes = schema
            .encode(spec.name, &random_values(&mut rng, spec.layout))
            .unwrap();
        let cut = rng.random_range(0..bytes.len());
        assert!(matches!(
            schema.decode(&bytes[..cut]),
            Err(ProtocolError::TruncatedFrame { .. })
        ));
    }
}

#[test]
fn test_random_bytes_decode_or_fail_cleanly() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 3);
    let schema = Schema::from_static(CLIENT_MESSAGES).unwrap();

    for _ in 0..ROUNDS * 5 {
        let len = rng.random_range(0..64);
        let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
        match schema.decode(&bytes) {
            Ok(frame) => {
                // Anything that decodes must re-encode to the same bytes.
                assert_eq!(schema.encode_frame(&frame).unwrap(), bytes);
            }
            Err(e) => assert!(
                e.is_desync(),
                "decode errors are always desync, got {e}"
            ),
        }
    }
}
