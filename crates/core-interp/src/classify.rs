//! Stack-break classification.
//!
//! A statement breaks the stack when its handler must block on driver I/O
//! (zeroing, probing, location/unit writes) or when any expression it will
//! evaluate reads a system variable — fresh driver data is only coherent
//! once in-flight motion has stopped. Classification is purely syntactic;
//! nothing here evaluates an expression or touches the driver.

use core_program::{Mnemonic, Statement};

/// Mnemonics whose handlers perform driver round trips.
const BREAKING: [&str; 15] = [
    "ZX", "ZY", "ZZ", "ZA", "ZB", "ZC", "Z2", "Z3", "Z4", "Z5", "Z6", "ZT", "EP", "VA", "VU",
];

pub fn is_breaking_mnemonic(mnemonic: Mnemonic) -> bool {
    BREAKING.contains(&mnemonic.as_str())
}

/// True when the statement (or, for a conditional, its `then` arm) names a
/// breaking handler, independent of any system-variable reads.
pub fn has_breaking_mnemonic(stmt: &Statement) -> bool {
    match stmt {
        Statement::Cmd { mnemonic, .. } => is_breaking_mnemonic(*mnemonic),
        Statement::Cond { then, .. } => has_breaking_mnemonic(then),
        _ => false,
    }
}

/// Must executing this statement flush the chunk and round-trip the driver?
pub fn breaks_stack(stmt: &Statement) -> bool {
    has_breaking_mnemonic(stmt) || stmt.references_sysvar()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_parse::parse_line;

    fn classify(src: &str) -> bool {
        breaks_stack(&parse_line(src, 1).unwrap())
    }

    #[test]
    fn plain_motion_does_not_break() {
        assert!(!classify("MX,10"));
        assert!(!classify("J2,1,2"));
        assert!(!classify("CG,,1,1,0,1,T"));
        assert!(!classify("VS,5,3"));
    }

    #[test]
    fn breaking_mnemonics() {
        assert!(classify("ZX"));
        assert!(classify("Z3"));
        assert!(classify("ZT"));
        assert!(classify("EP,-1"));
        assert!(classify("VA,1,2"));
        assert!(classify("VU,2000"));
    }

    #[test]
    fn sysvar_reference_breaks_any_statement() {
        assert!(classify("MX,%(1)"));
        assert!(classify("&a = %(71)"));
        assert!(classify("PAUSE %(1)"));
        assert!(classify("IF %(1) > 2 THEN GOTO a"));
    }

    #[test]
    fn conditional_inherits_breaking_then_arm() {
        assert!(classify("IF &a > 1 THEN ZX"));
        assert!(!classify("IF &a > 1 THEN MX,2"));
    }

    #[test]
    fn js_updates_driver_but_does_not_pause() {
        // Velocity-maxima writes are fire-and-forget.
        assert!(!classify("JS,6,4"));
    }
}
