//! Factory flow used when no stored flow exists or after a reset

use super::types::{ChatOption, Graph, Node, DEFAULT_STEP, START_STEP};

/// The built-in donation / volunteering / contact tree
pub fn default_flow() -> Graph {
    Graph::from_nodes([
        (
            START_STEP,
            Node::new(
                "Hello! Welcome to ONG Esperança. How can we help you today?",
                vec![
                    ChatOption::transition("I want to donate ❤️", "donation"),
                    ChatOption::transition("Volunteer 🤝", "volunteer"),
                    ChatOption::transition("Contact / Address 📍", "contact"),
                ],
            ),
        ),
        (
            "donation",
            Node::new(
                "Your help changes lives! How would you like to donate?",
                vec![
                    ChatOption::transition("PIX key", "pix"),
                    ChatOption::transition("Bank transfer", "bank"),
                    ChatOption::transition("Back", START_STEP),
                ],
            ),
        ),
        (
            "pix",
            Node::new(
                "Our PIX key is: doacao@ongesperanca.org.br",
                vec![ChatOption::transition("Back to start", START_STEP)],
            ),
        ),
        (
            "bank",
            Node::new(
                "Banco do Brasil | Branch: 1234-5 | Account: 98765-0 | CNPJ: 00.000.000/0001-99",
                vec![ChatOption::transition("Back to start", START_STEP)],
            ),
        ),
        (
            "volunteer",
            Node::new(
                "We need people like you! Fill in our online form or come visit us.",
                vec![
                    ChatOption::url("Fill in the form", "https://google.com/forms"),
                    ChatOption::transition("Back", START_STEP),
                ],
            ),
        ),
        (
            "contact",
            Node::new(
                "We are at Rua das Flores, 100. Open Mon-Fri from 9am to 6pm.",
                vec![
                    ChatOption::whatsapp("Talk on WhatsApp", "5511999999999"),
                    ChatOption::transition("Back", START_STEP),
                ],
            ),
        ),
        (DEFAULT_STEP, Node::new("Sorry, I didn't understand.", vec![])),
    ])
}
