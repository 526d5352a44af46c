//! Print → parse round-trips: the pretty printer's output re-parses to a
//! structurally equal tree.

use ionc_lang::parse_mechanism;
use ionc_lang::pretty::{mechanism_to_string, mechanism_eq};

fn roundtrip(src: &str) {
    let m1 = parse_mechanism(src).expect("parse original");
    let printed = mechanism_to_string(&m1);
    let m2 = parse_mechanism(&printed).unwrap_or_else(|e| {
        panic!("reparse failed: {}\nprinted source:\n{}", e, printed)
    });
    assert!(mechanism_eq(&m1, &m2), "round-trip mismatch:\n{}", printed);
}

#[test]
fn roundtrip_passive_channel() {
    roundtrip(
        r#"
        density pas {
            parameter g : conductance/area = 0.001 [S/cm^2];
            parameter e_rev = -70 [mV];
            bind v = membrane_potential;
            effect current_density = g*(v - e_rev);
            export g;
        }
        "#,
    );
}

#[test]
fn roundtrip_gated_channel() {
    roundtrip(
        r#"
        density kd {
            parameter gbar = 1e-5 [S/cm^2];
            parameter ek = -77 [mV];
            bind v = membrane_potential(k);
            state n : real;
            function ninf(u: voltage) : real {
                1.0/(1.0 + exp(-(u + 55 [mV])/10 [mV]))
            }
            initial n = ninf(v);
            evolve n' = (ninf(v) - n)/3 [ms];
            effect current_density(k) = gbar*n^4*(v - ek);
        }
        "#,
    );
}

#[test]
fn roundtrip_record_state() {
    roundtrip(
        r#"
        point exp2syn {
            record gates { a: real; b: real; };
            state s : gates;
            bind dt_ = dt;
            initial s = { a = 0.0; b = 0.0; };
            evolve s' = { a = -s.a/0.5 [ms]; b = -s.b/2 [ms]; };
        }
        "#,
    );
}

#[test]
fn roundtrip_expression_forms() {
    roundtrip(
        r#"
        density m {
            parameter a = let x = 2.0; if x > 1.0 { min(x, 3.0) } else { max(x, 0.5) };
            parameter b = abs(-2.0)*exprelr(0.1) + log(2.0);
            constant c : real = sin(1.0)*cos(1.0);
        }
        "#,
    );
}
