//! Unit tests for the trainer GATT protocol.

use routesim::sensors::ftms::{
    build_request_control, parse_cycling_power_measurement, GradientCommand,
};

#[test]
fn test_gradient_command_bytes() {
    assert_eq!(GradientCommand::encode(-5.0).as_bytes(), &[0x46, 0x0C, 0xFE]);
    assert_eq!(GradientCommand::encode(0.0).as_bytes(), &[0x46, 0x00, 0x00]);
    assert_eq!(GradientCommand::encode(20.0).as_bytes(), &[0x46, 0xD0, 0x07]);
}

#[test]
fn test_gradient_round_trip_within_a_hundredth() {
    let mut gradient = -20.0;
    while gradient <= 20.0 {
        let command = GradientCommand::encode(gradient);
        let decoded = GradientCommand::decode(command.as_ref()).unwrap();
        assert!(
            (decoded - gradient).abs() <= 0.005 + 1e-9,
            "{} decoded as {}",
            gradient,
            decoded
        );
        gradient += 0.037;
    }
}

#[test]
fn test_decode_rejects_other_commands() {
    assert_eq!(GradientCommand::decode(&build_request_control()), None);
    assert_eq!(GradientCommand::decode(&[0x46, 0x00]), None);
}

#[test]
fn test_power_measurement() {
    let parsed = parse_cycling_power_measurement(&[0x00, 0x00, 0xFA, 0x00]).unwrap();
    assert_eq!(parsed.power_watts, 250);

    let parsed = parse_cycling_power_measurement(&[0x00, 0x00, 0x10, 0x27, 0xAA]).unwrap();
    assert_eq!(parsed.power_watts, 10000);

    assert!(parse_cycling_power_measurement(&[0x00, 0x00, 0xFA]).is_none());
    assert!(parse_cycling_power_measurement(&[]).is_none());
}
