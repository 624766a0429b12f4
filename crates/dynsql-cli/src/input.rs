use std::io::Read;

use crate::cli::Input;

pub fn read_template(input: &Input) -> anyhow::Result<String> {
    let text = match input {
        Input::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;
            buf
        }
        Input::File(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?,
    };

    let text = text.trim_end_matches(['\n', '\r']).to_string();
    if text.trim().is_empty() {
        anyhow::bail!("no template provided (pass a file or pipe it to stdin)");
    }
    Ok(text)
}
