use act_dsl::ast::EthEnv;

use crate::types::ActType;

/// The fixed SMT constant name for an environment variable.
pub fn smt_name(env: EthEnv) -> &'static str {
    match env {
        EthEnv::Caller => "caller",
        EthEnv::Callvalue => "callvalue",
        EthEnv::Calldepth => "calldepth",
        EthEnv::Origin => "origin",
        EthEnv::Blockhash => "blockhash",
        EthEnv::Blocknumber => "blocknumber",
        EthEnv::Difficulty => "difficulty",
        EthEnv::Chainid => "chainid",
        EthEnv::Gaslimit => "gaslimit",
        EthEnv::Coinbase => "coinbase",
        EthEnv::Timestamp => "timestamp",
        EthEnv::This => "this",
        EthEnv::Nonce => "nonce",
    }
}

/// The act-type of an environment variable. `BLOCKHASH` is the only
/// bytestring; everything else is an integer.
pub fn env_type(env: EthEnv) -> ActType {
    match env {
        EthEnv::Blockhash => ActType::ByteStr,
        _ => ActType::Integer,
    }
}
