//! Issue and verify JWTs from the command line.
//!
//! Loads `.env` automatically if present, otherwise reads from the environment.
//!
//! ```bash
//! JWT_SECRET=123456 cargo run --example token -- generate alice admin,stu user:del
//! JWT_SECRET=123456 cargo run --example token -- verify eyJhbG...
//! ```
//!
//! | Variable        | Default  |
//! |-----------------|----------|
//! | `JWT_SECRET`    | required |
//! | `JWT_ALGORITHM` | `HS256`  |
//! | `JWT_PERIOD_MS` | `3600000`|
//! | `RUST_LOG`      | `info`   |

use jwt_issuer::{
    generate_jti, JwtConfig, JwtRepository, SignedJwtRepository, SigningContext, TokenRequest,
    VerifyingKey,
};
use tracing_subscriber::EnvFilter;

fn main() {
    // Load .env if present; silently ignore if absent.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        eprintln!("JWT_SECRET must be set");
        std::process::exit(1);
    });
    let algorithm = std::env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into());
    let period = std::env::var("JWT_PERIOD_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3_600_000);

    let config = JwtConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let repo = SignedJwtRepository::new(config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    match args[0].as_str() {
        "generate" => {
            let subject = args.get(1).unwrap_or_else(|| usage());
            let roles = args.get(2).cloned().unwrap_or_default();
            let perms = args.get(3).cloned().unwrap_or_default();
            let request = TokenRequest::new(subject)
                .token_id(generate_jti(16))
                .roles_and_permissions(roles, perms)
                .period(period);
            match repo.issue_jwt(&SigningContext::hmac(&secret, algorithm), &request) {
                Ok(token) => println!("{token}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        "verify" => {
            let token = args.get(1).unwrap_or_else(|| usage());
            match repo.get_payload(&VerifyingKey::secret(&secret), token, true) {
                Ok(p) => {
                    println!("Valid\n");
                    println!("  sub   : {}", p.subject().unwrap_or("-"));
                    if let Some(iss) = p.issuer() {
                        println!("  iss   : {iss}");
                    }
                    if !p.audience().is_empty() {
                        let aud: Vec<&str> = p.audience().iter().map(String::as_str).collect();
                        println!("  aud   : {}", aud.join(", "));
                    }
                    println!("  iat   : {}", fmt(p.issued_at()));
                    println!("  nbf   : {}", fmt(p.not_before()));
                    println!("  exp   : {}", fmt(p.expiration()));
                    if let Some(jti) = p.token_id() {
                        println!("  jti   : {jti}");
                    }
                    if let Some(roles) = p.roles() {
                        println!("  roles : {roles}");
                    }
                    if let Some(perms) = p.permissions() {
                        println!("  perms : {perms}");
                    }
                }
                Err(e) => {
                    eprintln!("Failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => usage(),
    }
}

fn fmt(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  cargo run --example token -- generate <subject> [roles] [perms]");
    eprintln!("  cargo run --example token -- verify   <token>");
    std::process::exit(1);
}
