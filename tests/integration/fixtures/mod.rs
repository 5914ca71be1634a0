// Sample call transcripts with their expected redacted text under the default configuration

/// Short exchange with one SSN and one phone number
pub const SHORT_CALL: &str = "Agent: Can you confirm your SSN?\nCaller: Sure, it's 078-05-1120.\nAgent: And a callback number?\nCaller: 555-867-5309.\n";

pub const SHORT_CALL_REDACTED: &str = "Agent: Can you confirm your SSN?\nCaller: Sure, it's <REDACTED:US_SSN>.\nAgent: And a callback number?\nCaller: 555-867-5309.\n";

/// Multi-byte speaker names, an account number and an email
pub const BILLING_CALL: &str = "Agent: Hola Señor Núñez, ¿en qué le ayudo?\nCaller: Account 40021873651, email nunez@example.mx. SSN 219-09-9999.\n";

pub const BILLING_CALL_REDACTED: &str = "Agent: Hola Señor Núñez, ¿en qué le ayudo?\nCaller: Account 40021873651, email nunez@example.mx. SSN <REDACTED:US_SSN>.\n";

/// Entity types the default configuration detects in `BILLING_CALL`, in order
pub const BILLING_CALL_ENTITIES: &[&str] = &["ACCOUNT_ID", "EMAIL_ADDRESS", "US_SSN"];
