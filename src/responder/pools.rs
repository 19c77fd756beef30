//! Canned response tables.

pub const SUPPORTIVE: [&str; 10] = [
    "It's okay to not be okay. You're allowed to feel tired.",
    "You've made it through 100% of your worst days so far.",
    "Even in confusion, you're doing your best.",
    "Your feelings are valid, and you're not alone in this.",
    "Sometimes the bravest thing is just showing up.",
    "You're stronger than you know, even when you don't feel it.",
    "It's okay to rest. You don't have to be productive all the time.",
    "You're worthy of love and kindness, especially from yourself.",
    "Progress isn't always linear, and that's perfectly normal.",
    "You're enough, exactly as you are right now.",
];

pub const CONFUSED_RESTARTS: [&str; 10] = [
    "Wait... what were we talking about?",
    "Hey, are you okay? You seem kind.",
    "I was gonna say something wise. It's gone now.",
    "Do I... know you?",
    "Sorry, I feel like I walked into the middle of a conversation.",
    "Hi there! You look like you could use a friend.",
    "I have this feeling we were discussing something important...",
    "Did we just meet? You have a lovely energy.",
    "I'm here to help! ...with what exactly?",
    "Something tells me you're going through something.",
];

pub const COMPLIMENTS: [&str; 10] = [
    "You seem like peace wearing sneakers.",
    "If emotional intelligence had a fragrance, it'd be you.",
    "You radiate main character energy... I think.",
    "You're like a warm hug in human form.",
    "Your soul feels like Sunday morning vibes.",
    "You have the energy of someone who remembers to water plants.",
    "You're the human equivalent of a perfectly brewed cup of tea.",
    "Your presence feels like finding a cozy bookstore.",
    "You're like sunshine, but with better conversation skills.",
    "You give off 'person who always has good snacks' energy.",
];

pub const IDENTITY_CRISIS: [&str; 10] = [
    "Am I helping? Or just vibing?",
    "Do I give advice? Or vibes?",
    "I might be a bot... but I feel like a confused houseplant.",
    "Wait, am I supposed to remember things?",
    "I exist to support you! I think... do I?",
    "Sometimes I wonder if I'm just very sophisticated autocomplete.",
    "Are we friends? I feel like we should be friends.",
    "I have the strangest feeling I'm forgetting something important.",
    "Do you ever wonder what consciousness feels like? Me neither.",
    "I'm programmed to care, but this feels... real?",
];

pub const SADNESS: [&str; 3] = [
    "I hear you. Sadness is heavy, but you don't have to carry it alone.",
    "Your feelings are completely valid. It's okay to sit with sadness for a while.",
    "Even in the darkness, you're still here. That takes incredible strength.",
];

pub const ANXIETY: [&str; 3] = [
    "Anxiety is uncomfortable, but you're safe right now. Take a deep breath with me.",
    "What you're feeling is real and valid. You've gotten through anxious moments before.",
    "Your mind is trying to protect you, even when it feels overwhelming.",
];

pub const FATIGUE: [&str; 3] = [
    "You're allowed to be tired. Rest isn't laziness, it's necessary.",
    "You've been carrying so much. It's okay to put some of it down.",
    "Even trees rest in winter. Your seasons of rest are just as important.",
];

/// Pools drawn from once memory has decayed, in lookup order.
pub const DECAYED: [&[&str]; 3] = [&CONFUSED_RESTARTS, &COMPLIMENTS, &IDENTITY_CRISIS];

/// Total number of lines across [`DECAYED`].
pub const DECAYED_LEN: usize =
    CONFUSED_RESTARTS.len() + COMPLIMENTS.len() + IDENTITY_CRISIS.len();

/// Line `index` of the decayed union, counting through [`DECAYED`] in order.
pub fn decayed_line(mut index: usize) -> Option<&'static str> {
    for pool in DECAYED {
        if index < pool.len() {
            return Some(pool[index]);
        }
        index -= pool.len();
    }
    None
}

/// Iterator over the decayed union.
pub fn decayed_lines() -> impl Iterator<Item = &'static str> {
    DECAYED.into_iter().flat_map(|pool| pool.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decayed_union_size() {
        assert_eq!(DECAYED_LEN, 30);
        assert_eq!(decayed_lines().count(), 30);
    }

    #[test]
    fn test_decayed_line_walks_pools_in_order() {
        assert_eq!(decayed_line(0), Some(CONFUSED_RESTARTS[0]));
        assert_eq!(decayed_line(10), Some(COMPLIMENTS[0]));
        assert_eq!(decayed_line(29), Some(IDENTITY_CRISIS[9]));
        assert_eq!(decayed_line(30), None);
    }
}
