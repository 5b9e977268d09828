//! tests/push_tests.rs
//! Envío push por la sesión WAHA del tenant (plan premium).

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::errors::AppError;
    use crate::models::broadcast_model::{BroadcastStatus, DeliveryMethod};
    use crate::models::recipient_model::RecipientStatus;
    use crate::models::tenant_model::Plan;
    use crate::services::push_sender::{PushSender, PushSummary};
    use crate::tests::support::{
        assert_count_invariants, create_request, test_config, wait_for_completion, FakeChannel,
        Harness,
    };
    use actix_rt::test;

    const WAIT: Duration = Duration::from_secs(5);

    fn sender_for(h: &Harness) -> PushSender {
        PushSender::new(
            h.services.broadcast_service.clone(),
            h.services.tenant_service.clone(),
            h.channel.clone(),
            Duration::ZERO,
        )
    }

    #[test]
    async fn test_premium_broadcast_waits_between_sends_and_survives_failures() {
        let channel = FakeChannel::working().failing_for("5215550002@c.us");
        let h = Harness::with_config(channel, test_config(Duration::from_secs(2))).await;
        let tenant = h.tenant(Plan::Premium).await;

        let b = h
            .broadcasts()
            .create(&tenant, create_request("Promo premium", &["5215550001", "5215550002"]))
            .await
            .unwrap();
        assert_eq!(b.delivery_method, DeliveryMethod::Waha);
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.sent_count, 1);
        assert_eq!(detail.broadcast.failed_count, 1);
        assert_eq!(detail.recipients[0].status, RecipientStatus::Sent);
        assert_eq!(detail.recipients[1].status, RecipientStatus::Failed);
        assert!(detail.recipients[1]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("number not on WhatsApp"));
        assert_count_invariants(&detail);

        let attempts = h.channel.attempts();
        assert_eq!(attempts.len(), 2);
        let gap = attempts[1].at.duration_since(attempts[0].at);
        assert!(gap >= Duration::from_secs(2), "gap = {:?}", gap);
    }

    #[test]
    async fn test_sends_in_creation_order_with_chat_suffix() {
        let h = Harness::new(FakeChannel::working()).await;
        let tenant = h.tenant(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(
                &tenant,
                create_request("Hola!", &["5215550003", "5215550001", "5215550002@c.us"]),
            )
            .await
            .unwrap();
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.sent_count, 3);
        assert!(detail.recipients.iter().all(|r| r.sent_at.is_some()));

        let attempts = h.channel.attempts();
        let chat_ids: Vec<&str> = attempts.iter().map(|a| a.chat_id.as_str()).collect();
        assert_eq!(
            chat_ids,
            vec!["5215550003@c.us", "5215550001@c.us", "5215550002@c.us"]
        );
        assert!(attempts.iter().all(|a| a.session == "tenant_session"));
        assert!(attempts.iter().all(|a| a.text == "Hola!"));
    }

    #[test]
    async fn test_unreachable_channel_fails_everyone_and_completes() {
        let h = Harness::new(FakeChannel::unreachable()).await;
        let tenant = h.tenant(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(&tenant, create_request("Hola", &["1", "2", "3"]))
            .await
            .unwrap();
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.sent_count, 0);
        assert_eq!(detail.broadcast.failed_count, 3);
        assert!(detail
            .recipients
            .iter()
            .all(|r| r.status == RecipientStatus::Failed && r.error_message.is_some()));
        assert_count_invariants(&detail);
    }

    #[test]
    async fn test_missing_session_fails_without_sending() {
        let h = Harness::new(FakeChannel::working()).await;
        let tenant = h.tenant_without_session(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(&tenant, create_request("Hola", &["1", "2"]))
            .await
            .unwrap();
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.failed_count, 2);
        assert_eq!(
            detail.recipients[0].error_message.as_deref(),
            Some("WhatsApp session not started")
        );
        assert!(h.channel.attempts().is_empty());
    }

    #[test]
    async fn test_disconnected_session_fails_without_sending() {
        let h = Harness::new(FakeChannel::working().with_status("SCAN_QR_CODE")).await;
        let tenant = h.tenant(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(&tenant, create_request("Hola", &["1"]))
            .await
            .unwrap();
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.failed_count, 1);
        assert!(detail.recipients[0]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("SCAN_QR_CODE"));
        assert!(h.channel.attempts().is_empty());
    }

    #[test]
    async fn test_run_refuses_desktop_and_skips_finished_broadcasts() {
        let h = Harness::new(FakeChannel::working()).await;
        let basic = h.tenant(Plan::Basic).await;
        let premium = h.tenant(Plan::Premium).await;
        let sender = sender_for(&h);

        let desktop = h
            .broadcasts()
            .create(&basic, create_request("Hola", &["1"]))
            .await
            .unwrap();
        h.broadcasts().start(&basic.id, &desktop.id).await.unwrap();
        let err = sender.run(&desktop.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        // Sin arrancar: no se envía nada
        let created = h
            .broadcasts()
            .create(&premium, create_request("Hola", &["1"]))
            .await
            .unwrap();
        assert_eq!(sender.run(&created.id).await.unwrap(), PushSummary::default());
        assert!(h.channel.attempts().is_empty());

        h.broadcasts().start(&premium.id, &created.id).await.unwrap();
        wait_for_completion(h.broadcasts(), &premium.id, &created.id, WAIT).await;
        assert_eq!(sender.run(&created.id).await.unwrap(), PushSummary::default());
        assert_eq!(h.channel.attempts().len(), 1);

        let err = sender.run("no-existe").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    async fn test_resume_picks_up_interrupted_push_broadcasts() {
        let h = Harness::new(FakeChannel::working()).await;
        let tenant = h.tenant(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(&tenant, create_request("Hola", &["1", "2", "3"]))
            .await
            .unwrap();

        // Simula un reinicio a mitad de envío: en curso, uno ya enviado
        sqlx::query("UPDATE broadcasts SET status = 'in_progress', started_at = ?2, sent_count = 1 WHERE id = ?1")
            .bind(&b.id)
            .bind(chrono::Utc::now())
            .execute(&h.pool)
            .await
            .unwrap();
        sqlx::query(
            "UPDATE broadcast_recipients SET status = 'sent', sent_at = ?2 WHERE id = (SELECT id FROM broadcast_recipients WHERE broadcast_id = ?1 ORDER BY rowid LIMIT 1)",
        )
        .bind(&b.id)
        .bind(chrono::Utc::now())
        .execute(&h.pool)
        .await
        .unwrap();

        let resumed = h.broadcasts().resume_push_broadcasts().await.unwrap();
        assert_eq!(resumed, 1);

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.sent_count, 3);
        assert_count_invariants(&detail);

        let chat_ids: Vec<String> = h.channel.attempts().into_iter().map(|a| a.chat_id).collect();
        assert_eq!(chat_ids, vec!["2@c.us".to_string(), "3@c.us".to_string()]);

        // Nada más para reanudar
        assert_eq!(h.broadcasts().resume_push_broadcasts().await.unwrap(), 0);
    }

    #[test]
    async fn test_duplicate_runs_count_each_recipient_once() {
        let h = Harness::new(FakeChannel::working()).await;
        let tenant = h.tenant(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(&tenant, create_request("Hola", &["1", "2", "3", "4"]))
            .await
            .unwrap();
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();
        // Segundo encolado del mismo broadcast mientras el primero corre
        h.broadcasts().resume_push_broadcasts().await.unwrap();

        // Y una corrida directa en paralelo
        let sender = sender_for(&h);
        sender.run(&b.id).await.unwrap();

        let detail = wait_for_completion(h.broadcasts(), &tenant.id, &b.id, WAIT).await;
        assert_eq!(detail.broadcast.sent_count, 4);
        assert_count_invariants(&detail);

        // Los envíos duplicados quedan como no-op al registrar
        let recorded: usize = detail
            .recipients
            .iter()
            .filter(|r| r.status == RecipientStatus::Sent)
            .count();
        assert_eq!(recorded, 4);
        assert!(h.channel.attempts().len() >= 4);
    }

    #[test]
    async fn test_worker_accepts_broadcast_again_after_task_panics() {
        let h = Harness::new(FakeChannel::working().panicking_for("1@c.us")).await;
        let tenant = h.tenant(Plan::Premium).await;
        let b = h
            .broadcasts()
            .create(&tenant, create_request("Hola", &["1", "2"]))
            .await
            .unwrap();
        h.broadcasts().start(&tenant.id, &b.id).await.unwrap();

        // Cada reanudación tiene que volver a correr el envío
        let deadline = Instant::now() + WAIT;
        while h.channel.attempts().len() < 3 {
            assert!(
                Instant::now() < deadline,
                "El worker dejó de aceptar el broadcast (intentos: {})",
                h.channel.attempts().len()
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
            h.broadcasts().resume_push_broadcasts().await.unwrap();
        }

        let detail = h.broadcasts().get_broadcast(&tenant.id, &b.id).await.unwrap();
        assert_eq!(detail.broadcast.status, BroadcastStatus::InProgress);
        assert_eq!((detail.broadcast.sent_count, detail.broadcast.failed_count), (0, 0));
        assert!(detail
            .recipients
            .iter()
            .all(|r| r.status == RecipientStatus::Pending));
    }
}
