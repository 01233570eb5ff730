//! Operating-system speech synthesizers driven as child processes.
//!
//! - Windows: PowerShell with `System.Speech`
//! - macOS: `say`
//! - Linux and others: `espeak-ng`
//!
//! Reply text never goes on a command line: it is written to the child's
//! stdin (or, for PowerShell, passed through an environment variable).

use std::io::Write;
use std::process::{Child, Command, Stdio};

use tracing::debug;

use loremaster_core::error::{LoreError, Result};

use crate::{SpeechEngine, Voice};

/// Words per minute at rate 0 for `say` and `espeak-ng`.
const BASE_WPM: i32 = 175;

const TEXT_ENV: &str = "LOREMASTER_SPEAK_TEXT";
const VOICE_ENV: &str = "LOREMASTER_SPEAK_VOICE";
const RATE_ENV: &str = "LOREMASTER_SPEAK_RATE";

const PS_LIST_VOICES: &str = "Add-Type -AssemblyName System.Speech; \
    $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
    $s.GetInstalledVoices() | ForEach-Object { $_.VoiceInfo.Id + '|' + $_.VoiceInfo.Name }";

const PS_SPEAK: &str = "Add-Type -AssemblyName System.Speech; \
    $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
    if ($env:LOREMASTER_SPEAK_VOICE) { $s.SelectVoice($env:LOREMASTER_SPEAK_VOICE) }; \
    $s.Rate = [int]$env:LOREMASTER_SPEAK_RATE; \
    $s.Speak($env:LOREMASTER_SPEAK_TEXT)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Synth {
    PowerShell,
    Say,
    Espeak,
}

impl Synth {
    fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Synth::PowerShell
        } else if cfg!(target_os = "macos") {
            Synth::Say
        } else {
            Synth::Espeak
        }
    }

    fn program(self) -> &'static str {
        match self {
            Synth::PowerShell => "powershell",
            Synth::Say => "say",
            Synth::Espeak => "espeak-ng",
        }
    }
}

/// The platform's built-in synthesizer.
#[derive(Debug, Clone)]
pub struct SystemSpeechEngine {
    synth: Synth,
    rate: i32,
}

impl SystemSpeechEngine {
    /// `rate` is a relative adjustment: 0 keeps the engine default.
    pub fn new(rate: i32) -> Self {
        Self {
            synth: Synth::detect(),
            rate,
        }
    }

    pub fn program(&self) -> &'static str {
        self.synth.program()
    }

    fn words_per_minute(&self) -> i32 {
        (BASE_WPM + self.rate * 10).max(80)
    }
}

impl Default for SystemSpeechEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SpeechEngine for SystemSpeechEngine {
    fn voices(&mut self) -> Result<Vec<Voice>> {
        let output = match self.synth {
            Synth::PowerShell => run(
                Command::new("powershell").args(["-NoProfile", "-Command", PS_LIST_VOICES]),
                None,
            )?,
            Synth::Say => run(Command::new("say").args(["-v", "?"]), None)?,
            Synth::Espeak => run(Command::new("espeak-ng").arg("--voices"), None)?,
        };

        let voices = match self.synth {
            Synth::PowerShell => parse_powershell_voices(&output),
            Synth::Say => parse_say_voices(&output),
            Synth::Espeak => parse_espeak_voices(&output),
        };
        debug!(count = voices.len(), program = self.program(), "Listed voices");
        Ok(voices)
    }

    fn speak(&mut self, text: &str, voice: Option<&Voice>) -> Result<()> {
        match self.synth {
            Synth::PowerShell => {
                let mut cmd = Command::new("powershell");
                cmd.args(["-NoProfile", "-Command", PS_SPEAK])
                    .env(TEXT_ENV, text)
                    .env(RATE_ENV, self.rate.clamp(-10, 10).to_string());
                match voice {
                    Some(v) => cmd.env(VOICE_ENV, &v.name),
                    None => cmd.env_remove(VOICE_ENV),
                };
                run(&mut cmd, None)?;
            }
            Synth::Say => {
                let mut cmd = Command::new("say");
                if let Some(v) = voice {
                    cmd.args(["-v", v.id.as_str()]);
                }
                if self.rate != 0 {
                    cmd.args(["-r", self.words_per_minute().to_string().as_str()]);
                }
                run(&mut cmd, Some(text))?;
            }
            Synth::Espeak => {
                let mut cmd = Command::new("espeak-ng");
                if let Some(v) = voice {
                    cmd.args(["-v", v.id.as_str()]);
                }
                if self.rate != 0 {
                    cmd.args(["-s", self.words_per_minute().to_string().as_str()]);
                }
                cmd.arg("--stdin");
                run(&mut cmd, Some(text))?;
            }
        }
        Ok(())
    }
}

/// Run `cmd` to completion, optionally feeding `input` on stdin, and return
/// its stdout.
fn run(cmd: &mut Command, input: Option<&str>) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| LoreError::Speech(format!("failed to spawn {program}: {e}")))?;

    if let Some(text) = input {
        feed_stdin(&mut child, &program, text)?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| LoreError::Speech(format!("failed to wait for {program}: {e}")))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LoreError::Speech(format!(
            "{program} exited with code {code}: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `text` to the child's stdin and close it.
///
/// On failure the child is killed and reaped before the error is returned.
fn feed_stdin(child: &mut Child, program: &str, text: &str) -> Result<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    if let Err(e) = stdin.write_all(text.as_bytes()) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(LoreError::Speech(format!("failed to write to {program}: {e}")));
    }
    Ok(())
}

// =============================================================================
// Voice list parsing
// =============================================================================

/// Lines of `id|name`.
fn parse_powershell_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let (id, name) = line.trim().split_once('|')?;
            (!id.is_empty()).then(|| Voice::new(id.trim(), name.trim()))
        })
        .collect()
}

/// Lines like `Samantha            en_US    # Hello, my name is Samantha.`
/// Names may contain spaces; the locale is the last token before `#`.
fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, _locale) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            (!name.is_empty()).then(|| Voice::new(name, name))
        })
        .collect()
}

/// `espeak-ng --voices` table:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
///
/// The gender column is folded into the name so voices can be matched on
/// "male"/"female".
fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                return None;
            }
            let gender = match cols[2].rsplit('/').next() {
                Some("F") => "female",
                _ => "male",
            };
            Some(Voice::new(cols[4], format!("{} ({})", cols[3], gender)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_powershell_voices() {
        let out = "TTS_MS_EN-US_DAVID_11.0|Microsoft David Desktop\r\n\
                   TTS_MS_EN-US_ZIRA_11.0|Microsoft Zira Desktop\r\n\
                   \r\n";
        let voices = parse_powershell_voices(out);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "TTS_MS_EN-US_DAVID_11.0");
        assert_eq!(voices[1].name, "Microsoft Zira Desktop");
    }

    #[test]
    fn test_parse_say_voices() {
        let out = "Alex                en_US    # Most people recognize me by my voice.\n\
                   Bad News            en_US    # The light you see at the end of the tunnel.\n";
        let voices = parse_say_voices(out);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "Alex");
        assert_eq!(voices[1].name, "Bad News");
    }

    #[test]
    fn test_parse_espeak_voices() {
        let out = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
                   5  af              --/M      Afrikaans          gmw/af\n \
                   5  en-us           --/F      English_(America)  gmw/en-US-nyc\n";
        let voices = parse_espeak_voices(out);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0], Voice::new("gmw/af", "Afrikaans (male)"));
        assert_eq!(voices[1].name, "English_(America) (female)");
    }

    #[test]
    fn test_parse_ignores_garbage() {
        assert!(parse_powershell_voices("no separator here").is_empty());
        assert!(parse_espeak_voices("header only").is_empty());
        assert!(parse_say_voices("").is_empty());
    }

    #[test]
    fn test_words_per_minute() {
        assert_eq!(SystemSpeechEngine::new(0).words_per_minute(), 175);
        assert_eq!(SystemSpeechEngine::new(5).words_per_minute(), 225);
        assert_eq!(SystemSpeechEngine::new(-50).words_per_minute(), 80);
    }

    #[test]
    fn test_program_matches_platform() {
        let engine = SystemSpeechEngine::default();
        let expected = if cfg!(target_os = "windows") {
            "powershell"
        } else if cfg!(target_os = "macos") {
            "say"
        } else {
            "espeak-ng"
        };
        assert_eq!(engine.program(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_child_is_reaped_when_stdin_write_fails() {
        // `true` exits without reading, so a write larger than the pipe buffer fails.
        let mut child = Command::new("true")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let text = "x".repeat(4 * 1024 * 1024);
        let err = feed_stdin(&mut child, "true", &text).unwrap_err();
        assert!(matches!(err, LoreError::Speech(ref msg) if msg.contains("failed to write to true")));
        assert!(child.stdin.is_none());
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_write_failure() {
        let text = "x".repeat(4 * 1024 * 1024);
        let err = run(&mut Command::new("true"), Some(&text)).unwrap_err();
        assert!(matches!(err, LoreError::Speech(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_feeds_stdin_to_the_child() {
        let out = run(&mut Command::new("cat"), Some("Hail, traveller")).unwrap();
        assert_eq!(out, "Hail, traveller");
    }
}
