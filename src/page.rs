//! HTML for the chat page.
//!
//! The page is a thin shell. It renders nothing from server state; the inline
//! script draws everything from the `/api/events` stream, starting with the
//! `snapshot` event.

/// Wrap `content` in the document shell.
pub fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="A supportive friend with a very short memory">
    <title>{title} - DotDotDot</title>
    <style>{STYLE}</style>
</head>
<body>
    {content}
    <script>{SCRIPT}</script>
</body>
</html>"#
    )
}

/// Chat page body.
pub fn chat_content() -> &'static str {
    r#"
    <div id="app-shell">
        <header class="chat-header">
            <div class="brand">
                <span class="brand-dot"></span>
                <div>
                    <h1>DotDotDot</h1>
                    <p class="tagline">Your forgetful friend</p>
                </div>
            </div>
            <div class="memory" title="Memory">
                <span id="memory-icon" class="memory-icon tier-nominal">&#9679;</span>
                <div class="memory-track">
                    <div id="memory-bar" class="memory-bar tier-nominal" style="width: 100%"></div>
                </div>
            </div>
        </header>

        <main id="messages" class="messages" aria-live="polite"></main>

        <div id="typing" class="bubble companion typing" hidden>
            <span></span><span></span><span></span>
        </div>

        <form id="composer" class="composer">
            <textarea
                id="message-input"
                name="text"
                rows="1"
                placeholder="Share what's on your mind..."
            ></textarea>
            <button id="send" type="submit" disabled>Send</button>
        </form>
    </div>
    "#
}

const STYLE: &str = r"
body { margin: 0; font-family: system-ui, sans-serif; background: #FAFAFA; color: #2E2E2E; }
#app-shell { display: flex; flex-direction: column; height: 100vh; max-width: 42rem; margin: 0 auto; }
.chat-header { display: flex; justify-content: space-between; align-items: center; padding: .75rem 1rem; background: #fff; border-bottom: 1px solid #e5e7eb; }
.brand { display: flex; gap: .75rem; align-items: center; }
.brand h1 { font-size: 1.25rem; margin: 0; }
.brand-dot { width: .75rem; height: .75rem; border-radius: 50%; background: #4ade80; }
.tagline { margin: 0; font-size: .75rem; color: #6b7280; }
.memory { display: flex; gap: .5rem; align-items: center; }
.memory-track { width: 4rem; height: .5rem; background: #e5e7eb; border-radius: 9999px; overflow: hidden; }
.memory-bar { height: 100%; transition: width .3s; }
.memory-bar.tier-nominal { background: #5C7AEA; }
.memory-bar.tier-warning { background: #eab308; }
.memory-bar.tier-critical { background: #f87171; }
.memory-icon.tier-nominal { color: #5C7AEA; }
.memory-icon.tier-warning { color: #eab308; }
.memory-icon.tier-critical { color: #f87171; }
.pulsing { animation: pulse 1s infinite; }
@keyframes pulse { 50% { opacity: .4; } }
.messages { flex: 1; overflow-y: auto; padding: 1.5rem 1rem; display: flex; flex-direction: column; gap: 1rem; }
.bubble { max-width: 28rem; padding: .75rem 1rem; border-radius: 1rem; line-height: 1.5; white-space: pre-wrap; }
.bubble.user { align-self: flex-end; background: #5C7AEA; color: #fff; }
.bubble.companion { align-self: flex-start; background: #E6E6E6; }
.typing { margin: 0 1rem 1rem; }
.typing span { display: inline-block; width: .5rem; height: .5rem; margin: 0 .1rem; border-radius: 50%; background: #9ca3af; animation: pulse 1s infinite; }
.composer { display: flex; gap: .5rem; padding: .75rem 1rem; background: #fff; border-top: 1px solid #e5e7eb; }
.composer textarea { flex: 1; resize: none; padding: .75rem 1rem; border: 0; border-radius: 1rem; background: #f3f4f6; font: inherit; }
.composer button { padding: 0 1.25rem; border: 0; border-radius: 9999px; background: #5C7AEA; color: #fff; }
.composer button:disabled { opacity: .5; cursor: not-allowed; }
";

const SCRIPT: &str = r"
(() => {
    const list = document.getElementById('messages');
    const typing = document.getElementById('typing');
    const input = document.getElementById('message-input');
    const send = document.getElementById('send');
    const bar = document.getElementById('memory-bar');
    const icon = document.getElementById('memory-icon');
    let busy = false;

    const refreshSend = () => { send.disabled = busy || !input.value.trim(); };

    const addMessage = (message) => {
        const bubble = document.createElement('div');
        bubble.className = 'bubble ' + message.originator;
        bubble.textContent = message.text;
        list.appendChild(bubble);
        list.scrollTop = list.scrollHeight;
    };

    const setTyping = (active) => {
        busy = active;
        typing.hidden = !active;
        refreshSend();
        list.scrollTop = list.scrollHeight;
    };

    const setMemory = (memory) => {
        const tier = 'tier-' + memory.tier;
        bar.style.width = memory.strength_percent + '%';
        bar.className = 'memory-bar ' + tier;
        icon.className = 'memory-icon ' + tier + (memory.pulsing ? ' pulsing' : '');
    };

    const events = new EventSource('/api/events');
    events.addEventListener('snapshot', (e) => {
        const snapshot = JSON.parse(e.data).data;
        list.replaceChildren();
        snapshot.messages.forEach(addMessage);
        setTyping(snapshot.typing);
        setMemory(snapshot.memory);
    });
    events.addEventListener('message.appended', (e) => addMessage(JSON.parse(e.data).data.message));
    events.addEventListener('typing', (e) => setTyping(JSON.parse(e.data).data.active));
    events.addEventListener('memory.tick', (e) => setMemory(JSON.parse(e.data).data));
    events.addEventListener('memory.reset', (e) => setMemory(JSON.parse(e.data).data));

    const submit = async () => {
        const text = input.value;
        if (busy || !text.trim()) return;
        input.value = '';
        refreshSend();
        await fetch('/api/messages', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ text }),
        });
    };

    document.getElementById('composer').addEventListener('submit', (e) => {
        e.preventDefault();
        submit();
    });
    input.addEventListener('input', refreshSend);
    input.addEventListener('keydown', (e) => {
        if (e.key === 'Enter' && !e.shiftKey) {
            e.preventDefault();
            submit();
        }
    });
})();
";
