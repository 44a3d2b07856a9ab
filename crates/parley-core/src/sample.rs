//! Sample - 対話的なサンプルプログラム
//!
//! 2 回 `request_input` で停止し、それぞれの reply で再開します。
//! `parley demo` / `parley serve` が export するのはこれです。

use async_trait::async_trait;

use crate::bridge::Bridge;
use crate::domain::TaskError;
use crate::typed::Program;

pub struct RunProgram;

#[async_trait]
impl Program for RunProgram {
    const NAME: &'static str = "run_program";
    type Output = ();

    async fn run(&self, bridge: Bridge) -> Result<(), TaskError> {
        bridge.emit_output("Program started ✅")?;
        let name = bridge.request_input("What is your name? ").await?;
        let age = bridge.request_input("How old are you? ").await?;
        bridge.emit_output(format!("Hello {name}, you are {age} years old."))?;
        Ok(())
    }
}
